pub mod api;
pub mod import;
pub mod telemetry;

pub mod util {
    pub mod db;
    pub mod env;
}
