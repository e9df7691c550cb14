//! Collaborators that move vendor data onto disk: HTTP download, zip
//! extraction, vendor transcoding and binary decoding into CSV artifacts.

pub mod archive;
pub mod decode;
pub mod http;
pub mod provider;
pub mod transcode;

pub use decode::{DecodeError, DecodeRequest, Decoder, TdxDecoder};
pub use http::HttpDownloader;
pub use provider::{DownloadError, Downloader};
pub use transcode::{NoopTranscoder, ToolTranscoder, TranscodeError, TranscodeKind, Transcoder};
