pub mod recording_api;
pub mod test_data;
