#![no_main]

use libfuzzer_sys::fuzz_target;
use std::rc::Rc;

use shark::parser;
use shark::runtime::{Config, Interpreter, Linker};

fuzz_target!(|data: &[u8]| {
    // First, try to decode the archive
    let archive = match parser::read_archive(data.to_vec()) {
        Ok(archive) => archive,
        Err(_) => return, // Malformed archive, nothing to execute
    };

    // Record every module and initialize the main one. Recursion is kept
    // shallow so runaway programs fail fast.
    let linker = Rc::new(Linker::new());
    let main = archive.header.main.clone();
    for image in archive.modules {
        linker.record(image);
    }
    let config = Config::builder().max_call_depth(64).build();
    let mut interp = Interpreter::with_config(linker, config);
    let module = match interp.import(&main) {
        Ok(module) => module,
        Err(_) => return, // Link or runtime error
    };

    // Try to call each global function with no arguments
    for name in module.bindings() {
        if let Some(function) = module.get(&name).and_then(|v| v.as_function().cloned()) {
            let _ = interp.call(&function, None, Vec::new());
        }
    }
});
