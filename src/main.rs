use meta2workflow_lib::{
    extract, source, AssembleRequest, Template, WorkflowAssembler, WorkflowConfig,
};
use rayon::prelude::*;
use std::collections::HashSet;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Default)]
struct CliOptions {
    inputs: Vec<PathBuf>,
    request: AssembleRequest,
    config: Option<PathBuf>,
    parsed_only: bool,
    out_dir: Option<PathBuf>,
}

fn usage() {
    println!("Converts A1111/Civitai generation metadata into a ComfyUI workflow.");
    println!();
    println!("Usage:");
    println!("  meta2workflow [OPTIONS] <INPUT>...");
    println!();
    println!("INPUT is a text file, a PNG with a parameters chunk, or - for stdin.");
    println!();
    println!("Options:");
    println!("  --template <basic|advanced|img2img>  Graph template (default: basic)");
    println!("  --model <NAME>                       Checkpoint override");
    println!("  --vae <NAME>                         Adds a VAE loader with this file");
    println!("  --image <PATH>                       Input image for the img2img template");
    println!("  --config <PATH>                      YAML/JSON workflow config");
    println!("  --parsed                             Print extracted parameters instead");
    println!("  --out-dir <DIR>                      Write <stem>.json per input");
    println!("  -h, --help                           Show this help");
}

fn parse_args() -> Result<CliOptions, String> {
    let mut options = CliOptions::default();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        let mut value_for = |flag: &str| {
            args.next()
                .ok_or_else(|| format!("Missing value after {}", flag))
        };
        match arg.as_str() {
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            "--template" => {
                options.request.template = Template::from_name(&value_for("--template")?)
            }
            "--model" => options.request.model_name = Some(value_for("--model")?),
            "--vae" => options.request.vae_name = Some(value_for("--vae")?),
            "--image" => options.request.input_image = Some(value_for("--image")?),
            "--config" => options.config = Some(PathBuf::from(value_for("--config")?)),
            "--out-dir" => options.out_dir = Some(PathBuf::from(value_for("--out-dir")?)),
            "--parsed" => options.parsed_only = true,
            flag if flag.starts_with("--") => {
                return Err(format!("Unknown argument: {}", flag));
            }
            input => options.inputs.push(PathBuf::from(input)),
        }
    }

    Ok(options)
}

fn render(
    input: &Path,
    options: &CliOptions,
    assembler: &WorkflowAssembler,
) -> Result<String, String> {
    let text = source::load_metadata(input).map_err(|error| error.to_string())?;
    let params = extract(&text);

    if options.parsed_only {
        return serde_json::to_string_pretty(&params)
            .map_err(|error| format!("Failed to serialize parameters: {}", error));
    }

    let document = assembler.assemble(&params, &options.request);
    if document.is_error() {
        log::warn!("Workflow for {} degraded to an error document", input.display());
    }
    Ok(document.to_pretty_json())
}

fn output_stem(input: &Path) -> &str {
    input
        .file_stem()
        .and_then(|value| value.to_str())
        .filter(|value| *value != source::STDIN_MARKER)
        .unwrap_or("stdin")
}

/// One `<stem>.json` target per input; repeated stems get a `-2`, `-3`, ... suffix.
fn output_paths(out_dir: &Path, inputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut used = HashSet::new();
    inputs
        .iter()
        .map(|input| {
            let stem = output_stem(input);
            let mut name = format!("{}.json", stem);
            let mut suffix = 2usize;
            while !used.insert(name.clone()) {
                name = format!("{}-{}.json", stem, suffix);
                suffix += 1;
            }
            out_dir.join(name)
        })
        .collect()
}

fn write_all(
    options: &CliOptions,
    assembler: &WorkflowAssembler,
    out_dir: &Path,
) -> Result<(), String> {
    std::fs::create_dir_all(out_dir).map_err(|error| {
        format!(
            "Failed to create output directory {}: {}",
            out_dir.display(),
            error
        )
    })?;

    let targets = output_paths(out_dir, &options.inputs);
    let results: Vec<(PathBuf, Result<PathBuf, String>)> = options
        .inputs
        .par_iter()
        .zip(targets.par_iter())
        .map(|(input, target)| {
            let result = render(input, options, assembler).and_then(|content| {
                std::fs::write(target, content)
                    .map(|_| target.clone())
                    .map_err(|error| format!("Failed to write {}: {}", target.display(), error))
            });
            (input.clone(), result)
        })
        .collect();

    let mut failed = 0usize;
    for (input, result) in &results {
        match result {
            Ok(target) => println!("{} -> {}", input.display(), target.display()),
            Err(error) => {
                failed += 1;
                eprintln!("{}: {}", input.display(), error);
            }
        }
    }

    log::info!(
        "Converted {}/{} input(s) into {}",
        results.len() - failed,
        results.len(),
        out_dir.display()
    );

    if failed > 0 {
        Err(format!("{} of {} input(s) failed", failed, results.len()))
    } else {
        Ok(())
    }
}

fn run() -> Result<(), String> {
    let options = parse_args()?;
    if options.inputs.is_empty() {
        usage();
        return Err("No input given".to_string());
    }

    let assembler = WorkflowAssembler::new(WorkflowConfig::load(options.config.as_deref()));

    match options.out_dir.as_deref() {
        Some(out_dir) => write_all(&options, &assembler, out_dir),
        None => {
            let [input] = options.inputs.as_slice() else {
                return Err("Multiple inputs require --out-dir".to_string());
            };
            println!("{}", render(input, &options, &assembler)?);
            Ok(())
        }
    }
}

fn main() {
    env_logger::init();

    if let Err(error) = run() {
        eprintln!("Error: {}", error);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_paths_keep_distinct_stems() {
        let out_dir = Path::new("/tmp/out");
        let inputs = vec![PathBuf::from("a/cat.txt"), PathBuf::from("dog.png")];

        assert_eq!(
            output_paths(out_dir, &inputs),
            vec![out_dir.join("cat.json"), out_dir.join("dog.json")]
        );
    }

    #[test]
    fn test_output_paths_suffix_repeated_stems() {
        let out_dir = Path::new("/tmp/out");
        let inputs = vec![
            PathBuf::from("a/x.txt"),
            PathBuf::from("b/x.txt"),
            PathBuf::from("x-2.txt"),
            PathBuf::from("c/x.png"),
        ];

        let targets = output_paths(out_dir, &inputs);
        assert_eq!(
            targets,
            vec![
                out_dir.join("x.json"),
                out_dir.join("x-2.json"),
                out_dir.join("x-2-2.json"),
                out_dir.join("x-3.json"),
            ]
        );
        assert_eq!(targets.iter().collect::<HashSet<_>>().len(), inputs.len());
    }

    #[test]
    fn test_stdin_input_is_named_stdin() {
        let out_dir = Path::new("/tmp/out");
        let inputs = vec![PathBuf::from(source::STDIN_MARKER), PathBuf::from("stdin.txt")];

        assert_eq!(
            output_paths(out_dir, &inputs),
            vec![out_dir.join("stdin.json"), out_dir.join("stdin-2.json")]
        );
    }

    #[test]
    fn test_write_all_keeps_every_same_stem_input() {
        let root = std::env::temp_dir().join("meta2workflow_write_all_test");
        let out_dir = root.join("out");
        std::fs::create_dir_all(root.join("a")).unwrap();
        std::fs::create_dir_all(root.join("b")).unwrap();
        std::fs::write(root.join("a/x.txt"), "cat\nSteps: 20").unwrap();
        std::fs::write(root.join("b/x.txt"), "dog\nSteps: 20").unwrap();

        let options = CliOptions {
            inputs: vec![root.join("a/x.txt"), root.join("b/x.txt")],
            ..Default::default()
        };
        write_all(&options, &WorkflowAssembler::default(), &out_dir).expect("both inputs convert");

        let first = std::fs::read_to_string(out_dir.join("x.json")).unwrap();
        let second = std::fs::read_to_string(out_dir.join("x-2.json")).unwrap();
        assert!(first.contains("\"text\": \"cat\""));
        assert!(second.contains("\"text\": \"dog\""));

        std::fs::remove_dir_all(&root).ok();
    }
}
