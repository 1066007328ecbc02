fn main() -> anyhow::Result<()> {
    notewall::cli::run()
}
