use prometheus::{register_int_counter, register_int_counter_vec, IntCounter, IntCounterVec};

lazy_static::lazy_static! {
    pub static ref STREAM_BYTES: IntCounter = register_int_counter!("vidshare_stream_bytes", "bytes of video sent to clients").unwrap();
    pub static ref STREAM_ABORTED: IntCounter = register_int_counter!("vidshare_stream_aborted", "streams dropped before the last byte was sent").unwrap();
    pub static ref STREAM_RESPONSES: IntCounterVec = register_int_counter_vec!("vidshare_stream_responses", "stream responses by status", &["status"]).unwrap();
    pub static ref UPLOADS: IntCounterVec = register_int_counter_vec!("vidshare_uploads", "upload attempts by outcome", &["outcome"]).unwrap();
}
