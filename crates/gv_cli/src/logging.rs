use std::sync::Once;

use tracing::Level;

static INIT: Once = Once::new();

pub fn init_logging(verbose: bool) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    INIT.call_once(|| {
        let level = if verbose { Level::DEBUG } else { Level::INFO };
        tracing_subscriber::fmt().with_max_level(level).init();
    });
}
