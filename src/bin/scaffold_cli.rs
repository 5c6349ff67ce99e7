fn main() {
    if let Err(err) = native::run() {
        eprintln!("scaffold_cli error: {err}");
        std::process::exit(1);
    }
}

mod native {
    use scaffold_engine::refine::RefineOptions;
    use scaffold_engine::{EngineOptions, GeneratorRegistry, ModelSettings, ScaffoldModel, init_logger};
    use std::fs;
    use std::path::{Path, PathBuf};

    const USAGE: &str = r#"scaffold_cli (scaffold-engine)

USAGE:
  scaffold_cli list
  scaffold_cli sets <scaffold type>
  scaffold_cli run <scaffold type> [options]
  scaffold_cli restore <settings.json> [options]

OPTIONS (run, restore):
  --set <name>           Parameter set to activate (run only, default `Default`)
  --refine <n>           Refine every element n times per local axis
  --delete <ranges>      Hide elements, e.g. `1-3,7`
  --out <path>           Write the output model as JSON (stdout otherwise)
  --settings-out <path>  Write the model settings as JSON
  --log <level>          Log level or spec, e.g. `debug` (default `info`)
  --overwrite            Overwrite existing output files
  -h, --help             Show this help
"#;

    pub fn run() -> Result<(), String> {
        let args: Vec<String> = std::env::args().skip(1).collect();
        let mut args = Args::new(args);

        let Some(command) = args.next() else {
            print_usage();
            return Ok(());
        };

        match command.as_str() {
            "list" => {
                let registry = registry()?;
                for name in registry.names() {
                    println!("{name}");
                }
                Ok(())
            }
            "sets" => {
                let scaffold_type = args.next().ok_or("missing scaffold type")?;
                let generator = registry()?.get(&scaffold_type).map_err(|e| e.to_string())?;
                for name in generator.parameter_set_names() {
                    println!("{name}");
                }
                Ok(())
            }
            "run" => {
                let scaffold_type = args.next().ok_or("missing scaffold type")?;
                cmd_run(Source::Type(scaffold_type), &mut args)
            }
            "restore" => {
                let path = PathBuf::from(args.next().ok_or("missing settings file")?);
                cmd_run(Source::Settings(path), &mut args)
            }
            "-h" | "--help" | "help" => {
                print_usage();
                Ok(())
            }
            other => Err(format!("unknown command `{other}`\n\n{USAGE}")),
        }
    }

    fn print_usage() {
        println!("{USAGE}");
    }

    fn registry() -> Result<GeneratorRegistry, String> {
        GeneratorRegistry::with_reference_generators().map_err(|e| e.to_string())
    }

    enum Source {
        Type(String),
        Settings(PathBuf),
    }

    #[derive(Default)]
    struct RunOptions {
        set: Option<String>,
        refine: Option<usize>,
        delete: Option<String>,
        out: Option<PathBuf>,
        settings_out: Option<PathBuf>,
        log: Option<String>,
        overwrite: bool,
    }

    fn parse_run_options(args: &mut Args) -> Result<Option<RunOptions>, String> {
        let mut options = RunOptions::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--set" => options.set = Some(args.value("--set")?),
                "--refine" => {
                    let text = args.value("--refine")?;
                    let count = text
                        .parse::<usize>()
                        .map_err(|_| format!("invalid --refine value `{text}`"))?;
                    options.refine = Some(count);
                }
                "--delete" => options.delete = Some(args.value("--delete")?),
                "--out" => options.out = Some(PathBuf::from(args.value("--out")?)),
                "--settings-out" => options.settings_out = Some(PathBuf::from(args.value("--settings-out")?)),
                "--log" => options.log = Some(args.value("--log")?),
                "--overwrite" => options.overwrite = true,
                "-h" | "--help" => {
                    print_usage();
                    return Ok(None);
                }
                other => return Err(format!("unknown option `{other}`")),
            }
        }
        Ok(Some(options))
    }

    fn cmd_run(source: Source, args: &mut Args) -> Result<(), String> {
        let Some(options) = parse_run_options(args)? else {
            return Ok(());
        };
        init_logger(options.log.as_deref().unwrap_or("info"))?;

        let registry = registry()?;
        let mut model = match source {
            Source::Type(scaffold_type) => {
                let mut model = ScaffoldModel::new(registry, &scaffold_type, EngineOptions::default())
                    .map_err(|e| e.to_string())?;
                if let Some(set) = &options.set {
                    model.select_parameter_set(set).map_err(|e| e.to_string())?;
                }
                model
            }
            Source::Settings(path) => {
                if options.set.is_some() {
                    return Err("--set cannot be combined with restore".into());
                }
                let text = fs::read_to_string(&path)
                    .map_err(|e| format!("failed to read {}: {e}", path.display()))?;
                let settings = ModelSettings::from_json(&text).map_err(|e| e.to_string())?;
                ScaffoldModel::from_settings(registry, &settings, EngineOptions::default())
                    .map_err(|e| e.to_string())?
            }
        };

        if let Some(count) = options.refine {
            model.set_refinement(Some(RefineOptions::uniform(count)));
        }
        if let Some(ranges) = &options.delete {
            model.set_deletion_ranges(ranges).map_err(|e| e.to_string())?;
        }
        let report = model.last_report();
        if !report.is_clean() {
            eprint!("{report}");
        }

        let output = model.output().map_err(|e| e.to_string())?;
        if let Some(refinement) = &output.refinement {
            if !refinement.is_clean() {
                eprint!("{refinement}");
            }
        }
        let json = output.to_json().map_err(|e| e.to_string())?;
        match &options.out {
            Some(path) => {
                write_text_file(path, &json, options.overwrite)?;
                eprintln!(
                    "wrote {} ({} elements, {} nodes)",
                    path.display(),
                    output.elements.len(),
                    output.nodes.len()
                );
            }
            None => println!("{json}"),
        }

        if let Some(path) = &options.settings_out {
            let settings = model.settings().to_json().map_err(|e| e.to_string())?;
            write_text_file(path, &settings, options.overwrite)?;
        }
        Ok(())
    }

    fn write_text_file(path: &Path, text: &str, overwrite: bool) -> Result<(), String> {
        if path.exists() && !overwrite {
            return Err(format!(
                "refusing to overwrite existing file {} (use --overwrite)",
                path.display()
            ));
        }
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| format!("failed to create {}: {e}", parent.display()))?;
            }
        }
        fs::write(path, text).map_err(|e| format!("failed to write {}: {e}", path.display()))
    }

    struct Args {
        args: Vec<String>,
        pos: usize,
    }

    impl Args {
        fn new(args: Vec<String>) -> Self {
            Self { args, pos: 0 }
        }

        fn next(&mut self) -> Option<String> {
            let arg = self.args.get(self.pos)?.clone();
            self.pos += 1;
            Some(arg)
        }

        fn value(&mut self, flag: &str) -> Result<String, String> {
            self.next()
                .ok_or_else(|| format!("missing value for {flag}"))
        }
    }
}
