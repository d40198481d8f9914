pub mod batch;
pub mod callback;
pub mod engine;
pub mod fallback;
pub mod naming;
pub mod openai;
pub mod single_job;
pub mod sink;
pub mod storage;
