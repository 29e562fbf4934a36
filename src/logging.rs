/// Initialize logging with env_logger.
///
/// Defaults to `info`; override with `RUST_LOG`. Safe to call more than
/// once, later calls are ignored.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}
