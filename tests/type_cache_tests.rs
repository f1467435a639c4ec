use std::sync::Arc;

use jembed::common::{BootstrapClassPath, TypeCache};
use jembed::{Compiler, Config, ExpressionCompiler};

fn shared(cache: &TypeCache) -> Compiler {
    Compiler::with_class_path(Config::default(), cache.clone(), BootstrapClassPath)
}

#[test]
fn repeated_resolution_reuses_cached_types() {
    let cache = TypeCache::new();
    let expr = "String.valueOf(Integer.parseInt(\"12\") + 1).length()";

    let first = ExpressionCompiler::new(shared(&cache)).compile(expr).unwrap();
    let string = cache.get("java/lang/String").expect("String was not cached");
    let integer = cache.get("java/lang/Integer").expect("Integer was not cached");
    let size = cache.len();

    let second = ExpressionCompiler::new(shared(&cache)).compile(expr).unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.len(), size);
    assert!(Arc::ptr_eq(&string, &cache.get("java/lang/String").unwrap()));
    assert!(Arc::ptr_eq(&integer, &cache.get("java/lang/Integer").unwrap()));
}

#[test]
fn compilers_on_threads_share_one_cache() {
    let cache = TypeCache::new();
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let compiler = shared(&cache);
            std::thread::spawn(move || {
                ExpressionCompiler::new(compiler)
                    .return_type("String")
                    .compile(&format!("\"n\" + {} + Math.max({}, 2)", i, i))
                    .unwrap()
            })
        })
        .collect();
    for handle in handles {
        assert_eq!(handle.join().unwrap().len(), 1);
    }
    let string = cache.get("java/lang/String").unwrap();
    let again = ExpressionCompiler::new(shared(&cache)).compile("\"x\".length()").unwrap();
    assert_eq!(again.len(), 1);
    assert!(Arc::ptr_eq(&string, &cache.get("java/lang/String").unwrap()));
}

#[test]
fn private_caches_are_independent() {
    let a = Compiler::new(Config::default());
    let b = Compiler::new(Config::default());
    assert!(!a.cache().same_cache(b.cache()));
    ExpressionCompiler::new(a.clone()).compile("\"s\".length()").unwrap();
    assert!(a.cache().contains("java/lang/String"));
    assert!(!b.cache().contains("java/lang/String"));
}
