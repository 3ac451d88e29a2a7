//! Neural rating models.

mod cnn_fm;
mod dcn;
mod deepconn;
mod ffm;
mod fm;
mod ncf;
mod wdn;

pub use cnn_fm::CnnFmModel;
pub use dcn::DcnModel;
pub use deepconn::DeepConnModel;
pub use ffm::FfmModel;
pub use fm::FmModel;
pub use ncf::NcfModel;
pub use wdn::WdnModel;
