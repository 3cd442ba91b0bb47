// Build script to compile GLSL shaders to SPIR-V

use std::path::Path;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=shaders/simple.vert");
    println!("cargo:rerun-if-changed=shaders/simple.frag");

    // Compile shaders using glslc (part of Vulkan SDK)
    compile_shader("shaders/simple.vert", "shaders/simple.vert.spv");
    compile_shader("shaders/simple.frag", "shaders/simple.frag.spv");
}

fn compile_shader(input: &str, output: &str) {
    let input_path = Path::new(input);
    let output_path = Path::new(output);

    let result = Command::new("glslc")
        .arg(input_path)
        .arg("-o")
        .arg(output_path)
        .status();

    match result {
        Ok(status) if status.success() => {}
        Ok(status) => {
            println!(
                "cargo:warning=Failed to compile {}: exit code {:?}",
                input,
                status.code()
            );
        }
        Err(e) => {
            println!("cargo:warning=glslc not found ({}), {} was not compiled", e, input);
            println!("cargo:warning=Install the Vulkan SDK or run: glslc {} -o {}", input, output);
        }
    }
}
