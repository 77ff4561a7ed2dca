fn main() -> anyhow::Result<()> {
    rte_kpi_lib::run()
}
