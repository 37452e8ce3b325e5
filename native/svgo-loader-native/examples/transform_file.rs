//! Runs both rewrite phases over one component file and prints the result.
//!
//! ```text
//! cargo run --example transform_file -- <icons dir> <file.vue> [--watch]
//! ```
//!
//! With `--watch` the icon directory stays watched and every refresh pushed
//! to a local devtools observer is printed.

use std::env;
use std::fs;
use std::process::ExitCode;
use std::sync::Arc;

use svgo_loader_native::rpc::{local_pair, DevtoolsServer};
use svgo_loader_native::{
    AssetRegistry, AssetRoot, AssetWatcher, InvalidationDebouncer, LoaderOptions, SourceFile,
    SvgoLoader,
};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_target(false)
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    let (Some(icons), Some(file)) = (args.first(), args.get(1)) else {
        eprintln!("usage: transform_file <icons dir> <file.vue> [--watch]");
        return ExitCode::FAILURE;
    };
    let watch = args.iter().any(|a| a == "--watch");

    let code = match fs::read_to_string(file) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("cannot read {}: {}", file, e);
            return ExitCode::FAILURE;
        }
    };

    let options = LoaderOptions::default().with_root(AssetRoot::new(icons));
    let registry = Arc::new(AssetRegistry::new(&options));
    let loader = match SvgoLoader::new(&options, Arc::clone(&registry)) {
        Ok(loader) => loader,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let outputs = loader
        .transform_batch(vec![SourceFile::new(file.as_str(), code.as_str())])
        .await;
    for output in &outputs {
        if output.is_unchanged() {
            println!("{}: unchanged", output.id);
        } else {
            println!("{}", output.final_code(&code));
        }
    }

    if !watch {
        return ExitCode::SUCCESS;
    }

    let debouncer = InvalidationDebouncer::spawn(Arc::clone(&registry), options.debounce());
    let _watcher = match AssetWatcher::start(&registry, debouncer.handle()) {
        Ok(watcher) => watcher,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let server = DevtoolsServer::new(&options, Arc::clone(&registry));
    let _forward = server.forward_refreshes(debouncer.subscribe());
    let (channel, incoming, mut observer) = local_pair();
    server.connect(Arc::new(channel), incoming);

    println!("watching {} for changes", icons);
    while let Some(frame) = observer.recv().await {
        if let Some(envelope) = server.group().codec().decode(&frame) {
            println!("observer received {:?}", envelope);
        }
        println!("{} icons now", registry.get().await.len());
    }
    ExitCode::SUCCESS
}
