fn main() -> anyhow::Result<()> {
    skilllab::run()
}
