/// REST client defaults: timeout, retry count, backoff between retries.
pub struct RestConfig {
    pub base_url: &'static str,
    pub timeout_ms: u64,
    pub retries: u32,
    pub backoff_ms: u64,
}

pub struct WsConfig {
    pub url: &'static str,
    pub initial_reconnect_delay_sec: u64,
    pub max_reconnect_delay_sec: u64,
}

pub struct BackendConfig {
    pub rest: RestConfig,
    pub ws: WsConfig,
}

pub const BACKEND: BackendConfig = BackendConfig {
    rest: RestConfig {
        base_url: "http://127.0.0.1:8090/api",
        timeout_ms: 5000,
        retries: 3,
        backoff_ms: 1000,
    },
    ws: WsConfig {
        url: "ws://127.0.0.1:8090/ws/market",
        initial_reconnect_delay_sec: 1,
        max_reconnect_delay_sec: 300, // 5 minutes
    },
};
