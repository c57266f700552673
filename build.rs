fn main() {
    // The mpi feature links the system MPI library through the C shim.
    if std::env::var_os("CARGO_FEATURE_MPI").is_some() {
        println!("cargo:rustc-link-lib=mpi");
        println!("cargo:rerun-if-changed=src/transport/shim.c");
        cc::Build::new().file("src/transport/shim.c").compile("shim");
    }
}
