//! Backend clients and the driver traits controllers are generic over.

pub mod couchbase;
pub mod postgres;
pub mod redpanda;
pub mod traits;

pub use couchbase::{CouchbaseClient, Endpoints};
pub use postgres::PostgresClient;
pub use redpanda::RedpandaClient;
pub use traits::*;
