fn main() -> std::process::ExitCode {
    minytd_lib::run()
}
