//! 业务能力层
//!
//! 每个服务只描述"我能做什么"，只处理单个对象（一张验证码、一批记录、一个图片集），
//! 不关心流程顺序。

pub mod challenge;
pub mod dataset_sink;
pub mod file_sink;
pub mod form_filler;
pub mod image_store;

pub use challenge::{capture_challenge, CapturedChallenge, ChallengeSolver, HttpChallengeSolver};
pub use dataset_sink::{DatasetSink, HttpDatasetSink, JsonlDatasetSink};
pub use file_sink::{DelimitedFileSink, FileSink};
pub use form_filler::FormFiller;
pub use image_store::{ImageComposer, ImageStore, LocalImageStore, ZipComposer};
