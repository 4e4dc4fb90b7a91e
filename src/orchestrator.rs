use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};

use clap::{value_parser, Arg, ArgMatches, Command};
use serde_json::{json, Value};
use tracing::debug;

use formgen::api::{ApiResponse, FormService};
use formgen::config::Config;
use formgen::dsl::TargetKind;
use formgen::edit::FieldEdit;
use formgen::llm::{client_from_config, ModelClient};
use formgen::pipeline::Pipeline;
use formgen::store::FileStore;

type Service = FormService<Box<dyn ModelClient>, FileStore>;

const TABLE_PREFIX: &str = "table:";

fn cli() -> Command {
    let id = || Arg::new("id").required(true).help("Document id");
    Command::new("formgen")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Generate form and table definitions from plain-language use cases")
        .arg_required_else_help(true)
        .subcommand(
            Command::new("generate")
                .about("Generate and store a definition")
                .arg(
                    Arg::new("kind")
                        .required(true)
                        .value_parser(["form", "table"])
                        .help("What to generate"),
                )
                .arg(
                    Arg::new("use_case")
                        .required(true)
                        .num_args(1..)
                        .help("Use case, e.g. \"job application with resume upload\""),
                ),
        )
        .subcommand(Command::new("get").about("Print a stored document").arg(id()))
        .subcommand(
            Command::new("put")
                .about("Validate and store a definition read from a file (`-` for stdin)")
                .arg(Arg::new("file").required(true)),
        )
        .subcommand(Command::new("list").about("Print every stored document"))
        .subcommand(Command::new("delete").about("Delete a stored document").arg(id()))
        .subcommand(
            Command::new("add-field")
                .about("Add a field (or column) to a document")
                .arg(id())
                .arg(Arg::new("field").required(true).help("Field as a JSON object"))
                .arg(
                    Arg::new("at")
                        .long("at")
                        .value_parser(value_parser!(usize))
                        .help("Insert position; appends when omitted"),
                ),
        )
        .subcommand(
            Command::new("remove-field")
                .about("Remove a field (or column) by name")
                .arg(id())
                .arg(Arg::new("name").required(true)),
        )
        .subcommand(
            Command::new("update-field")
                .about("Merge a JSON patch into a field (or column)")
                .arg(id())
                .arg(Arg::new("name").required(true))
                .arg(Arg::new("patch").required(true).help("Patch as a JSON object; null removes a key")),
        )
        .subcommand(
            Command::new("convert")
                .about("Convert a stored form into a table and print its SQL")
                .arg(id()),
        )
        .subcommand(Command::new("repl").about("Generate interactively; prefix a line with `table:` for tables"))
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let matches = cli().get_matches();
    let config = Config::from_env()?;
    debug!(?config, "configuration loaded");
    let store = FileStore::new(config.store_dir.clone());

    match matches.subcommand() {
        Some(("generate", args)) => {
            let kind: TargetKind = string_arg(args, "kind").parse()?;
            let use_case = args
                .get_many::<String>("use_case")
                .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "))
                .unwrap_or_default();
            let service = with_model(&config, store)?;
            emit(&service.generate(&json!({ "useCase": use_case }), kind))
        }
        Some(("get", args)) => emit(&without_model(store).get(string_arg(args, "id"))),
        Some(("put", args)) => {
            let body: Value = serde_json::from_str(&read_input(string_arg(args, "file"))?)?;
            emit(&without_model(store).post(&body))
        }
        Some(("list", _)) => emit(&without_model(store).list()),
        Some(("delete", args)) => emit(&without_model(store).delete(string_arg(args, "id"))),
        Some(("add-field", args)) => {
            let edit = FieldEdit::Add {
                field: serde_json::from_str(string_arg(args, "field"))?,
                position: args.get_one::<usize>("at").copied(),
            };
            emit(&without_model(store).edit(string_arg(args, "id"), &edit))
        }
        Some(("remove-field", args)) => {
            let edit = FieldEdit::Remove {
                name: string_arg(args, "name").to_string(),
            };
            emit(&without_model(store).edit(string_arg(args, "id"), &edit))
        }
        Some(("update-field", args)) => {
            let edit = FieldEdit::Update {
                name: string_arg(args, "name").to_string(),
                patch: serde_json::from_str(string_arg(args, "patch"))?,
            };
            emit(&without_model(store).edit(string_arg(args, "id"), &edit))
        }
        Some(("convert", args)) => emit(&without_model(store).convert(string_arg(args, "id"))),
        Some(("repl", _)) => repl(&with_model(&config, store)?),
        _ => Ok(()),
    }
}

fn with_model(config: &Config, store: FileStore) -> Result<Service, Box<dyn Error>> {
    let client = client_from_config(config)?;
    let pipeline = Pipeline::new(client, config.params.clone()).with_debug_dir(config.debug_dir.clone());
    Ok(FormService::new(pipeline, store))
}

fn without_model(store: FileStore) -> Service {
    FormService::without_model(store)
}

fn string_arg<'a>(args: &'a ArgMatches, name: &str) -> &'a str {
    args.get_one::<String>(name).map(String::as_str).unwrap_or_default()
}

fn read_input(path: &str) -> io::Result<String> {
    if path == "-" {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        fs::read_to_string(path)
    }
}

fn print_body(response: &ApiResponse) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(&response.body)?);
    Ok(())
}

fn emit(response: &ApiResponse) -> Result<(), Box<dyn Error>> {
    print_body(response)?;
    if response.is_success() {
        Ok(())
    } else {
        Err(format!("request failed with status {}", response.status).into())
    }
}

fn repl(service: &Service) -> Result<(), Box<dyn Error>> {
    println!("formgen ready. Describe a form, or start with `{TABLE_PREFIX}` for a table. Ctrl-D exits.");
    let mut line = String::new();
    loop {
        print!(">> ");
        io::stdout().flush()?;
        line.clear();
        if io::stdin().read_line(&mut line)? == 0 {
            break;
        }
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text == "exit" || text == "quit" {
            break;
        }

        let (kind, use_case) = match text.strip_prefix(TABLE_PREFIX) {
            Some(rest) => (TargetKind::Table, rest.trim()),
            None => (TargetKind::Form, text),
        };
        print_body(&service.generate(&json!({ "useCase": use_case }), kind))?;
    }
    Ok(())
}
