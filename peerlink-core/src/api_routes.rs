macro_rules! v1_path {
    ($path:literal) => {
        concat!("/api/v1", $path)
    };
}

/// Liveness probe, outside the versioned tree.
pub const HEALTH: &str = "/health";

/// Versioned API route definitions shared by the server and its clients
pub mod v1 {
    pub const ROOT: &str = "/api/v1";

    pub mod federation {
        pub const STATUS: &str = v1_path!("/federation/status");
        pub const PEERS: &str = v1_path!("/federation/peers");
        pub const TEST_PEER: &str = v1_path!("/federation/peers/test");
        pub const MODES: &str = v1_path!("/federation/modes");
        pub const REFRESH: &str = v1_path!("/federation/refresh");
        pub const AGGREGATE: &str = v1_path!("/federation/aggregate");

        pub mod playback {
            pub const RESOLVE: &str = v1_path!("/federation/playback/resolve");
            pub const STREAM: &str = v1_path!("/federation/stream");
        }
    }
}
