// The event bus is driven from a single logical thread.
#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = lib_tile_host::init().await {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}
