// ei2gst — Edge Impulse DRP-AI deployment to GStreamer DRP-AI plugin converter
//
// Library root. Stages run in module order: extract, schema, bind, addrmap,
// then descriptor and anchors project the finished table into plugin files.

pub mod addrmap;
pub mod anchors;
pub mod bind;
pub mod codec;
pub mod descriptor;
pub mod diag;
pub mod error;
pub mod extract;
pub mod pipeline;
pub mod scan;
pub mod schema;
pub mod table;

pub use error::ConvertError;
pub use pipeline::{run, ConvertOptions};
