pub mod model;
pub mod query;
pub mod snowflake;
pub mod util;
