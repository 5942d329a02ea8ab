fn main() -> anyhow::Result<()> {
    scene_showcase::run()
}
