pub mod dismissal;
pub mod kv;
