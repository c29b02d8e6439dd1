use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CONTAINER_BOOKMARKS_LOG";

fn main() {
    if handle_cli_flags() {
        return;
    }

    init_logging();

    let args = std::env::args().skip(1).collect::<Vec<_>>();
    if let Err(err) = container_bookmarks::run(args) {
        eprintln!("error: {err:?}");
        std::process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("Container Bookmarks {}", container_bookmarks::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{}", container_bookmarks::app::USAGE);
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}
