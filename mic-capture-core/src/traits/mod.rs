pub mod audio_hardware;
pub mod output_sink;
