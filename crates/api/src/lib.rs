pub mod inbound;
pub mod middleware;
pub mod routes;
pub mod state;
