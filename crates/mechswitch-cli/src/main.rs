fn main() -> anyhow::Result<()> {
    mechswitch_cli::init_logging();
    mechswitch_cli::run()
}
