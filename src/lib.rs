//! Converts A1111/Civitai image-generation metadata into ComfyUI workflow graphs.
//!
//! The pipeline has two pure stages:
//! 1. [`metadata::extract`] turns caption text into [`ParsedParameters`], pulling
//!    `<lora:name:strength>` tags out of the positive prompt.
//! 2. [`workflow::WorkflowAssembler`] maps those parameters onto the basic, advanced
//!    (two-pass upscale) or img2img graph template.
//!
//! Neither stage fails: extraction degrades to the defaults record and assembly
//! degrades to a single `{error, message}` document.

pub mod config;
pub mod error;
pub mod graph;
pub mod lora;
pub mod metadata;
pub mod samplers;
pub mod source;
pub mod workflow;

pub use config::WorkflowConfig;
pub use graph::{GraphDocument, GraphNode, NodeLink};
pub use lora::{extract_loras, LoraExtraction, LoraRef};
pub use metadata::{extract, FieldValue, ParsedParameters};
pub use workflow::{assemble, AssembleRequest, Template, WorkflowAssembler, WorkflowDocument};

/// Runs both stages on one metadata blob.
pub fn convert(
    text: &str,
    assembler: &WorkflowAssembler,
    request: &AssembleRequest,
) -> WorkflowDocument {
    let params = extract(text);
    assembler.assemble(&params, request)
}
