pub mod recording_writer;
pub mod summary;
