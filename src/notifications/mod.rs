pub mod dispatch;
pub mod routes;
pub mod store;
