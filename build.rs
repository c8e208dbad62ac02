// Embeds version metadata into the Windows executable.

#[cfg(windows)]
fn main() {
    use winres::WindowsResource;

    let mut res = WindowsResource::new();
    res.set("ProductName", "Image Upscaler")
        .set("FileDescription", "Upscale images 2x, 3x or 4x with Real-ESRGAN")
        .set("LegalCopyright", "Copyright (C) 2024");
    if let Err(e) = res.compile() {
        println!("cargo:warning=failed to embed Windows resources: {}", e);
    }
}

#[cfg(not(windows))]
fn main() {
    // Nothing to do on non-Windows platforms
}
