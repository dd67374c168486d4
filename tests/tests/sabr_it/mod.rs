mod chunk_index;
mod chunk_source;
mod events;
mod media_period;
mod session_driver;
