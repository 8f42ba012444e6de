fn main() {
    // Enables `doc_auto_cfg` for feature gated items like the `clipboard` module when building docs on nightly
    #[rustversion::nightly]
    fn emit_nightly_cfg() {
        println!("cargo:rustc-cfg=nightly")
    }
    #[rustversion::not(nightly)]
    fn emit_nightly_cfg() {}

    emit_nightly_cfg();
    println!("cargo::rustc-check-cfg=cfg(nightly)");
}
