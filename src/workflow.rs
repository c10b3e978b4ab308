use crate::config::WorkflowConfig;
use crate::error::AssembleError;
use crate::graph::{GraphDocument, GraphNode, NodeLink};
use crate::lora::LoraRef;
use crate::metadata::ParsedParameters;
use crate::samplers::{map_sampler, map_scheduler};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::str::FromStr;

const SAMPLER_ID: &str = "3";
const CHECKPOINT_ID: &str = "4";
const EMPTY_LATENT_ID: &str = "5";
const POSITIVE_ID: &str = "6";
const NEGATIVE_ID: &str = "7";
const VAE_DECODE_ID: &str = "8";
const SAVE_IMAGE_ID: &str = "9";
const VAE_LOADER_ID: &str = "10";
const LOAD_IMAGE_ID: &str = "10";
const UPSCALE_LATENT_ID: &str = "11";
const UPSCALE_SAMPLER_ID: &str = "12";
const VAE_ENCODE_ID: &str = "13";

/// LoRA loaders occupy a contiguous id block starting here.
pub const LORA_NODE_BASE_ID: usize = 100;

// CheckpointLoaderSimple output slots.
const MODEL_SLOT: u32 = 0;
const CLIP_SLOT: u32 = 1;
const VAE_SLOT: u32 = 2;

const FALLBACK_DIMENSION: i64 = 512;
const UPSCALE_FACTOR: i64 = 2;
const UPSCALE_DENOISE: f64 = 0.5;
const MIN_UPSCALE_STEPS: i64 = 10;

const FAILURE_ERROR: &str = "Failed to generate workflow";
const FAILURE_MESSAGE: &str = "Please check the parsed metadata and try again";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Template {
    #[default]
    Basic,
    Advanced,
    Img2Img,
}

impl Template {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Advanced => "advanced",
            Self::Img2Img => "img2img",
        }
    }

    /// Lenient lookup: unknown names select the basic template.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|_| {
            log::warn!("Unknown workflow template '{}', using basic", name);
            Self::Basic
        })
    }
}

impl FromStr for Template {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "basic" => Ok(Self::Basic),
            "advanced" => Ok(Self::Advanced),
            "img2img" => Ok(Self::Img2Img),
            _ => Err(format!(
                "Unsupported template '{}'. Use 'basic', 'advanced' or 'img2img'.",
                value
            )),
        }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied overrides for one assembly.
#[derive(Debug, Clone, Default)]
pub struct AssembleRequest {
    pub model_name: Option<String>,
    pub vae_name: Option<String>,
    pub template: Template,
    /// Image path for the img2img `LoadImage` node; defaults to the configured placeholder.
    pub input_image: Option<String>,
}

/// Assembler output: a graph, or the single error document that replaces it on failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum WorkflowDocument {
    Graph(GraphDocument),
    Error { error: String, message: String },
}

impl WorkflowDocument {
    fn failure() -> Self {
        Self::Error {
            error: FAILURE_ERROR.to_string(),
            message: FAILURE_MESSAGE.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }

    pub fn graph(&self) -> Option<&GraphDocument> {
        match self {
            Self::Graph(graph) => Some(graph),
            Self::Error { .. } => None,
        }
    }

    /// Pretty-printed JSON with 2-space indentation.
    pub fn to_pretty_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_else(|error| {
            log::error!("Failed to serialize workflow: {}", error);
            format!(
                "{{\n  \"error\": \"{}\",\n  \"message\": \"{}\"\n}}",
                FAILURE_ERROR, FAILURE_MESSAGE
            )
        })
    }
}

/// Builds ComfyUI workflow graphs from [`ParsedParameters`].
#[derive(Debug, Clone, Default)]
pub struct WorkflowAssembler {
    config: WorkflowConfig,
}

/// Assembles a workflow with the default configuration.
pub fn assemble(
    params: &ParsedParameters,
    model_name: Option<&str>,
    vae_name: Option<&str>,
    template: Template,
) -> WorkflowDocument {
    let request = AssembleRequest {
        model_name: model_name.map(str::to_string),
        vae_name: vae_name.map(str::to_string),
        template,
        input_image: None,
    };
    WorkflowAssembler::default().assemble(params, &request)
}

impl WorkflowAssembler {
    pub fn new(config: WorkflowConfig) -> Self {
        Self { config }
    }

    /// Never fails: internal faults are logged and produce the error document.
    pub fn assemble(
        &self,
        params: &ParsedParameters,
        request: &AssembleRequest,
    ) -> WorkflowDocument {
        match self.try_assemble(params, request) {
            Ok(graph) => WorkflowDocument::Graph(graph),
            Err(error) => {
                log::error!(
                    "Error generating {} workflow: {}",
                    request.template,
                    error
                );
                WorkflowDocument::failure()
            }
        }
    }

    pub fn try_assemble(
        &self,
        params: &ParsedParameters,
        request: &AssembleRequest,
    ) -> Result<GraphDocument, AssembleError> {
        let document = match request.template {
            Template::Basic => self.build_basic(params, request)?,
            Template::Advanced => self.build_advanced(params, request)?,
            Template::Img2Img => self.build_img2img(params, request)?,
        };
        document.validate_links()?;

        log::debug!(
            "Assembled {} workflow with {} nodes",
            request.template,
            document.len()
        );
        Ok(document)
    }

    fn checkpoint_name(&self, params: &ParsedParameters, request: &AssembleRequest) -> String {
        non_empty(request.model_name.as_deref())
            .or_else(|| non_empty(params.model.as_deref()))
            .unwrap_or(self.config.default_checkpoint.as_str())
            .to_string()
    }

    /// txt2img graph with an optional VAE loader and LoRA chain.
    fn build_basic(
        &self,
        params: &ParsedParameters,
        request: &AssembleRequest,
    ) -> Result<GraphDocument, AssembleError> {
        let (width, height) = parse_dimensions(&params.size);
        let upstream = chain_source_id(params.loras.len());
        let model_link = NodeLink::new(upstream.clone(), MODEL_SLOT);
        let clip_link = NodeLink::new(upstream, CLIP_SLOT);

        let mut document = GraphDocument::new();
        document.insert(
            SAMPLER_ID,
            sampler_node(
                params,
                "KSampler",
                params.steps.to_json(),
                json!(1.0),
                model_link,
                NodeLink::new(EMPTY_LATENT_ID, 0),
            ),
        );
        document.insert(CHECKPOINT_ID, self.checkpoint_node(params, request));
        document.insert(
            EMPTY_LATENT_ID,
            GraphNode::new("EmptyLatentImage", "Empty Latent Image")
                .with_value("width", width)
                .with_value("height", height)
                .with_value("batch_size", self.config.batch_size),
        );
        document.insert(
            POSITIVE_ID,
            text_encode_node(
                &params.positive_prompt,
                "CLIP Text Encode (Prompt)",
                clip_link.clone(),
            ),
        );
        document.insert(
            NEGATIVE_ID,
            text_encode_node(
                &params.negative_prompt,
                "CLIP Text Encode (Negative)",
                clip_link,
            ),
        );
        document.insert(
            VAE_DECODE_ID,
            vae_decode_node(
                NodeLink::new(SAMPLER_ID, 0),
                NodeLink::new(CHECKPOINT_ID, VAE_SLOT),
            ),
        );
        document.insert(SAVE_IMAGE_ID, self.save_image_node());

        insert_lora_chain(&mut document, &params.loras);

        if let Some(vae_name) = non_empty(request.vae_name.as_deref()) {
            document.insert(
                VAE_LOADER_ID,
                GraphNode::new("VAELoader", "Load VAE").with_value("vae_name", vae_name),
            );
            document
                .require_mut(VAE_DECODE_ID)?
                .set_link("vae", NodeLink::new(VAE_LOADER_ID, 0));
        }

        Ok(document)
    }

    /// Basic graph plus a 2x latent upscale and a second, lighter sampling pass.
    fn build_advanced(
        &self,
        params: &ParsedParameters,
        request: &AssembleRequest,
    ) -> Result<GraphDocument, AssembleError> {
        let mut document = self.build_basic(params, request)?;
        let (width, height) = parse_dimensions(&params.size);
        let steps = params
            .steps
            .typed()
            .ok_or_else(|| AssembleError::NonNumericField {
                field: "steps".to_string(),
                raw: params.steps.to_string(),
            })?;
        let (upscaled_width, upscaled_height) = width
            .checked_mul(UPSCALE_FACTOR)
            .zip(height.checked_mul(UPSCALE_FACTOR))
            .ok_or_else(|| AssembleError::NonNumericField {
                field: "size".to_string(),
                raw: params.size.clone(),
            })?;

        document.insert(
            UPSCALE_LATENT_ID,
            GraphNode::new("LatentUpscale", "Upscale Latent")
                .with_value("upscale_method", self.config.upscale_method.as_str())
                .with_value("width", upscaled_width)
                .with_value("height", upscaled_height)
                .with_value("crop", "disabled")
                .with_link("samples", NodeLink::new(SAMPLER_ID, 0)),
        );
        document.insert(
            UPSCALE_SAMPLER_ID,
            sampler_node(
                params,
                "KSampler (Upscale)",
                json!(upscale_steps(steps)),
                json!(UPSCALE_DENOISE),
                NodeLink::new(CHECKPOINT_ID, MODEL_SLOT),
                NodeLink::new(UPSCALE_LATENT_ID, 0),
            ),
        );
        document
            .require_mut(VAE_DECODE_ID)?
            .set_link("samples", NodeLink::new(UPSCALE_SAMPLER_ID, 0));

        Ok(document)
    }

    /// img2img graph: the sampler starts from the VAE-encoded input image.
    fn build_img2img(
        &self,
        params: &ParsedParameters,
        request: &AssembleRequest,
    ) -> Result<GraphDocument, AssembleError> {
        if !params.loras.is_empty() {
            log::debug!(
                "img2img template has no LoRA chain; ignoring {} LoRA(s)",
                params.loras.len()
            );
        }

        let denoise = params
            .denoising_strength
            .as_ref()
            .map(|value| value.to_json())
            .unwrap_or_else(|| json!(self.config.img2img_denoise));
        let input_image = non_empty(request.input_image.as_deref())
            .unwrap_or(self.config.input_image.as_str())
            .to_string();
        let clip_link = NodeLink::new(CHECKPOINT_ID, CLIP_SLOT);

        let mut document = GraphDocument::new();
        document.insert(
            SAMPLER_ID,
            sampler_node(
                params,
                "KSampler",
                params.steps.to_json(),
                denoise,
                NodeLink::new(CHECKPOINT_ID, MODEL_SLOT),
                NodeLink::new(VAE_ENCODE_ID, 0),
            ),
        );
        document.insert(CHECKPOINT_ID, self.checkpoint_node(params, request));
        document.insert(
            POSITIVE_ID,
            text_encode_node(
                &params.positive_prompt,
                "CLIP Text Encode (Prompt)",
                clip_link.clone(),
            ),
        );
        document.insert(
            NEGATIVE_ID,
            text_encode_node(
                &params.negative_prompt,
                "CLIP Text Encode (Negative)",
                clip_link,
            ),
        );
        document.insert(
            VAE_DECODE_ID,
            vae_decode_node(
                NodeLink::new(SAMPLER_ID, 0),
                NodeLink::new(CHECKPOINT_ID, VAE_SLOT),
            ),
        );
        document.insert(SAVE_IMAGE_ID, self.save_image_node());
        document.insert(
            LOAD_IMAGE_ID,
            GraphNode::new("LoadImage", "Load Image").with_value("image", input_image),
        );
        document.insert(
            VAE_ENCODE_ID,
            GraphNode::new("VAEEncode", "VAE Encode")
                .with_link("pixels", NodeLink::new(LOAD_IMAGE_ID, 0))
                .with_link("vae", NodeLink::new(CHECKPOINT_ID, VAE_SLOT)),
        );

        Ok(document)
    }

    fn checkpoint_node(&self, params: &ParsedParameters, request: &AssembleRequest) -> GraphNode {
        GraphNode::new("CheckpointLoaderSimple", "Load Checkpoint")
            .with_value("ckpt_name", self.checkpoint_name(params, request))
    }

    fn save_image_node(&self) -> GraphNode {
        GraphNode::new("SaveImage", "Save Image")
            .with_value("filename_prefix", self.config.filename_prefix.as_str())
            .with_link("images", NodeLink::new(VAE_DECODE_ID, 0))
    }
}

fn sampler_node(
    params: &ParsedParameters,
    title: &str,
    steps: Value,
    denoise: Value,
    model: NodeLink,
    latent_image: NodeLink,
) -> GraphNode {
    GraphNode::new("KSampler", title)
        .with_value("seed", params.seed.to_json())
        .with_value("steps", steps)
        .with_value("cfg", params.cfg_scale.to_json())
        .with_value("sampler_name", map_sampler(&params.sampler))
        .with_value("scheduler", map_scheduler(&params.scheduler))
        .with_value("denoise", denoise)
        .with_link("model", model)
        .with_link("positive", NodeLink::new(POSITIVE_ID, 0))
        .with_link("negative", NodeLink::new(NEGATIVE_ID, 0))
        .with_link("latent_image", latent_image)
}

fn text_encode_node(text: &str, title: &str, clip: NodeLink) -> GraphNode {
    GraphNode::new("CLIPTextEncode", title)
        .with_value("text", text)
        .with_link("clip", clip)
}

fn vae_decode_node(samples: NodeLink, vae: NodeLink) -> GraphNode {
    GraphNode::new("VAEDecode", "VAE Decode")
        .with_link("samples", samples)
        .with_link("vae", vae)
}

pub fn lora_node_id(index: usize) -> String {
    (LORA_NODE_BASE_ID + index).to_string()
}

/// Node whose MODEL/CLIP outputs feed the samplers and text encoders.
fn chain_source_id(lora_count: usize) -> String {
    match lora_count {
        0 => CHECKPOINT_ID.to_string(),
        count => lora_node_id(count - 1),
    }
}

/// Inserts one `LoraLoader` per reference; each one consumes the previous node's MODEL/CLIP.
fn insert_lora_chain(document: &mut GraphDocument, loras: &[LoraRef]) {
    for (index, lora) in loras.iter().enumerate() {
        let upstream = chain_source_id(index);
        document.insert(
            lora_node_id(index),
            GraphNode::new("LoraLoader", "Load LoRA")
                .with_value("lora_name", lora.name.as_str())
                .with_value("strength_model", lora.strength)
                .with_value("strength_clip", lora.strength)
                .with_link("model", NodeLink::new(upstream.clone(), MODEL_SLOT))
                .with_link("clip", NodeLink::new(upstream, CLIP_SLOT)),
        );
    }
}

/// Parses a `WxH` size, falling back to 512x512 unless both halves are integers.
pub fn parse_dimensions(size: &str) -> (i64, i64) {
    size.split_once('x')
        .and_then(|(width, height)| {
            let width = width.trim().parse::<i64>().ok()?;
            let height = height.trim().parse::<i64>().ok()?;
            Some((width, height))
        })
        .unwrap_or((FALLBACK_DIMENSION, FALLBACK_DIMENSION))
}

/// Second-pass step count: half the first pass (floored), never below 10.
pub fn upscale_steps(steps: i64) -> i64 {
    steps.div_euclid(2).max(MIN_UPSCALE_STEPS)
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{extract, FieldValue};

    fn params_with_loras(count: usize) -> ParsedParameters {
        let mut params = extract(
            "masterpiece, best quality, 1girl\nNegative prompt: ugly, blurry\nSteps: 20, Sampler: DPM++ 2M Karras, Schedule type: Karras, CFG scale: 7, Seed: 12345, Size: 640x448",
        );
        params.loras = (0..count)
            .map(|index| LoraRef {
                name: format!("style_{index}"),
                strength: 0.5 + index as f64 * 0.1,
                source_tag: String::new(),
            })
            .collect();
        params
    }

    fn build(params: &ParsedParameters, template: Template) -> GraphDocument {
        let request = AssembleRequest {
            template,
            ..Default::default()
        };
        WorkflowAssembler::default()
            .try_assemble(params, &request)
            .expect("workflow should assemble")
    }

    fn link_of<'a>(document: &'a GraphDocument, node: &str, input: &str) -> &'a NodeLink {
        document
            .node(node)
            .and_then(|node| node.link(input))
            .unwrap_or_else(|| panic!("node {node} should link input {input}"))
    }

    #[test]
    fn test_basic_workflow_without_loras() {
        let document = build(&params_with_loras(0), Template::Basic);
        let ids: Vec<&str> = document.ids().collect();

        assert_eq!(ids, vec!["3", "4", "5", "6", "7", "8", "9"]);
        assert_eq!(link_of(&document, "3", "model"), &NodeLink::new("4", 0));
        assert_eq!(link_of(&document, "6", "clip"), &NodeLink::new("4", 1));
        assert_eq!(link_of(&document, "8", "vae"), &NodeLink::new("4", 2));

        let sampler = document.node("3").unwrap();
        assert_eq!(sampler.value("steps"), Some(&json!(20)));
        assert_eq!(sampler.value("seed"), Some(&json!(12345)));
        assert_eq!(sampler.value("cfg"), Some(&json!(7.0)));
        assert_eq!(sampler.value("sampler_name"), Some(&json!("dpmpp_2m")));
        assert_eq!(sampler.value("scheduler"), Some(&json!("karras")));
        assert_eq!(sampler.value("denoise"), Some(&json!(1.0)));

        let latent = document.node("5").unwrap();
        assert_eq!(latent.value("width"), Some(&json!(640)));
        assert_eq!(latent.value("height"), Some(&json!(448)));

        let positive = document.node("6").unwrap();
        assert_eq!(
            positive.value("text"),
            Some(&json!("masterpiece, best quality, 1girl"))
        );
        assert_eq!(
            document.node("4").unwrap().value("ckpt_name"),
            Some(&json!("sd_xl_base_1.0.safetensors"))
        );
    }

    #[test]
    fn test_basic_lora_chain_is_contiguous_and_feeds_consumers() {
        for count in [0usize, 1, 2, 3, 5] {
            let params = params_with_loras(count);
            let document = build(&params, Template::Basic);

            let lora_ids: Vec<&str> = document
                .nodes()
                .filter(|(_, node)| node.class_type == "LoraLoader")
                .map(|(id, _)| id)
                .collect();
            let expected: Vec<String> = (0..count).map(lora_node_id).collect();
            assert_eq!(lora_ids, expected, "count {count}");

            let feeder = if count == 0 {
                "4".to_string()
            } else {
                (99 + count).to_string()
            };
            assert_eq!(link_of(&document, "3", "model").node_id, feeder);
            assert_eq!(link_of(&document, "6", "clip").node_id, feeder);
            assert_eq!(link_of(&document, "7", "clip").node_id, feeder);

            for index in 0..count {
                let id = lora_node_id(index);
                let upstream = if index == 0 {
                    "4".to_string()
                } else {
                    lora_node_id(index - 1)
                };
                assert_eq!(link_of(&document, &id, "model"), &NodeLink::new(upstream.clone(), 0));
                assert_eq!(link_of(&document, &id, "clip"), &NodeLink::new(upstream, 1));

                let node = document.node(&id).unwrap();
                let strength = params.loras[index].strength;
                assert_eq!(node.value("lora_name"), Some(&json!(params.loras[index].name)));
                assert_eq!(node.value("strength_model"), Some(&json!(strength)));
                assert_eq!(node.value("strength_clip"), Some(&json!(strength)));
            }
        }
    }

    #[test]
    fn test_vae_override_adds_loader_and_redirects_decode() {
        let request = AssembleRequest {
            model_name: Some("test_model.safetensors".to_string()),
            vae_name: Some("test_vae.safetensors".to_string()),
            template: Template::Basic,
            input_image: None,
        };
        let document = WorkflowAssembler::default()
            .try_assemble(&params_with_loras(0), &request)
            .expect("workflow should assemble");

        assert_eq!(
            document.node("10").unwrap().value("vae_name"),
            Some(&json!("test_vae.safetensors"))
        );
        assert_eq!(link_of(&document, "8", "vae"), &NodeLink::new("10", 0));
        assert_eq!(
            document.node("4").unwrap().value("ckpt_name"),
            Some(&json!("test_model.safetensors"))
        );
    }

    #[test]
    fn test_blank_overrides_are_ignored() {
        let mut params = params_with_loras(0);
        params.model = Some("from_metadata.safetensors".to_string());
        let document = assemble(&params, Some(""), Some("   "), Template::Basic);
        let graph = document.graph().expect("graph document");

        assert!(!graph.contains("10"));
        assert_eq!(
            graph.node("4").unwrap().value("ckpt_name"),
            Some(&json!("from_metadata.safetensors"))
        );
    }

    #[test]
    fn test_advanced_adds_upscale_pass() {
        let params = params_with_loras(2);
        let document = build(&params, Template::Advanced);

        let upscale = document.node("11").unwrap();
        assert_eq!(upscale.value("width"), Some(&json!(1280)));
        assert_eq!(upscale.value("height"), Some(&json!(896)));
        assert_eq!(link_of(&document, "11", "samples"), &NodeLink::new("3", 0));

        let second = document.node("12").unwrap();
        assert_eq!(second.title(), "KSampler (Upscale)");
        assert_eq!(second.value("steps"), Some(&json!(10)));
        assert_eq!(second.value("denoise"), Some(&json!(0.5)));
        assert_eq!(link_of(&document, "12", "model"), &NodeLink::new("4", 0));
        assert_eq!(link_of(&document, "12", "latent_image"), &NodeLink::new("11", 0));
        assert_eq!(link_of(&document, "8", "samples"), &NodeLink::new("12", 0));
        assert_eq!(link_of(&document, "3", "model"), &NodeLink::new("101", 0));
    }

    #[test]
    fn test_advanced_second_pass_steps() {
        assert_eq!(upscale_steps(5), 10);
        assert_eq!(upscale_steps(41), 20);
        assert_eq!(upscale_steps(20), 10);
        assert_eq!(upscale_steps(0), 10);

        for (steps, expected) in [(5, 10), (41, 20), (60, 30)] {
            let mut params = params_with_loras(0);
            params.steps = FieldValue::Typed(steps);
            let document = build(&params, Template::Advanced);
            assert_eq!(
                document.node("12").unwrap().value("steps"),
                Some(&json!(expected))
            );
            assert_eq!(document.node("12").unwrap().value("denoise"), Some(&json!(0.5)));
        }
    }

    #[test]
    fn test_img2img_workflow() {
        let mut params = params_with_loras(3);
        params.denoising_strength = Some(FieldValue::Typed(0.45));
        let request = AssembleRequest {
            template: Template::Img2Img,
            input_image: Some("source.png".to_string()),
            ..Default::default()
        };
        let document = WorkflowAssembler::default()
            .try_assemble(&params, &request)
            .expect("workflow should assemble");

        let ids: Vec<&str> = document.ids().collect();
        assert_eq!(ids, vec!["3", "4", "6", "7", "8", "9", "10", "13"]);
        assert_eq!(
            document.node("10").unwrap().value("image"),
            Some(&json!("source.png"))
        );
        assert_eq!(link_of(&document, "13", "pixels"), &NodeLink::new("10", 0));
        assert_eq!(link_of(&document, "3", "latent_image"), &NodeLink::new("13", 0));
        assert_eq!(link_of(&document, "3", "model"), &NodeLink::new("4", 0));
        assert_eq!(document.node("3").unwrap().value("denoise"), Some(&json!(0.45)));
    }

    #[test]
    fn test_img2img_defaults_denoise_and_placeholder() {
        let document = build(&params_with_loras(0), Template::Img2Img);

        assert_eq!(document.node("3").unwrap().value("denoise"), Some(&json!(0.7)));
        assert_eq!(
            document.node("10").unwrap().value("image"),
            Some(&json!("input_image_placeholder"))
        );
    }

    #[test]
    fn test_no_dangling_links_for_any_template() {
        for template in [Template::Basic, Template::Advanced, Template::Img2Img] {
            for count in [0usize, 1, 3] {
                for vae in [None, Some("vae.safetensors")] {
                    let document = assemble(&params_with_loras(count), None, vae, template);
                    let graph = document.graph().expect("graph document");
                    assert!(graph.validate_links().is_ok());
                    for (_, _, link) in graph.links() {
                        assert!(
                            graph.contains(&link.node_id),
                            "{template} with {count} LoRA(s) links missing node {}",
                            link.node_id
                        );
                    }
                }
            }
        }
    }

    #[test]
    fn test_unparsable_size_falls_back_to_512() {
        assert_eq!(parse_dimensions("abcxdef"), (512, 512));
        assert_eq!(parse_dimensions("768"), (512, 512));
        assert_eq!(parse_dimensions("1x2x3"), (512, 512));
        assert_eq!(parse_dimensions("768x1024"), (768, 1024));

        let mut params = params_with_loras(0);
        params.size = "abcxdef".to_string();
        let document = build(&params, Template::Basic);
        let latent = document.node("5").unwrap();
        assert_eq!(latent.value("width"), Some(&json!(512)));
        assert_eq!(latent.value("height"), Some(&json!(512)));
    }

    #[test]
    fn test_raw_steps_pass_through_basic_but_fail_advanced() {
        let mut params = params_with_loras(0);
        params.steps = FieldValue::Raw("99999999999999999999".to_string());

        let basic = build(&params, Template::Basic);
        assert_eq!(
            basic.node("3").unwrap().value("steps"),
            Some(&json!("99999999999999999999"))
        );

        let advanced = assemble(&params, None, None, Template::Advanced);
        assert!(advanced.is_error());
        let value: Value =
            serde_json::from_str(&advanced.to_pretty_json()).expect("error document is JSON");
        assert_eq!(value["error"], json!("Failed to generate workflow"));
        assert_eq!(value.as_object().map(|object| object.len()), Some(2));
    }

    #[test]
    fn test_pretty_json_uses_two_space_indent() {
        let document = assemble(&params_with_loras(1), None, None, Template::Basic);
        let text = document.to_pretty_json();

        assert!(text.starts_with("{\n  \"3\": {\n    \"inputs\": {"));
        let value: Value = serde_json::from_str(&text).expect("valid JSON");
        assert_eq!(value["100"]["class_type"], json!("LoraLoader"));
        assert_eq!(value["3"]["inputs"]["model"], json!(["100", 0]));
    }

    #[test]
    fn test_template_names() {
        assert_eq!("ADVANCED".parse::<Template>(), Ok(Template::Advanced));
        assert_eq!(Template::from_name("img2img"), Template::Img2Img);
        assert_eq!(Template::from_name("inpaint"), Template::Basic);
        assert!("inpaint".parse::<Template>().is_err());
    }

    #[test]
    fn test_config_overrides_node_defaults() {
        let config = WorkflowConfig {
            default_checkpoint: "pony.safetensors".to_string(),
            filename_prefix: "meta".to_string(),
            img2img_denoise: 0.6,
            ..WorkflowConfig::default()
        };
        let assembler = WorkflowAssembler::new(config);
        let request = AssembleRequest {
            template: Template::Img2Img,
            ..Default::default()
        };
        let document = assembler
            .try_assemble(&params_with_loras(0), &request)
            .expect("workflow should assemble");

        assert_eq!(
            document.node("4").unwrap().value("ckpt_name"),
            Some(&json!("pony.safetensors"))
        );
        assert_eq!(
            document.node("9").unwrap().value("filename_prefix"),
            Some(&json!("meta"))
        );
        assert_eq!(document.node("3").unwrap().value("denoise"), Some(&json!(0.6)));
    }
}
