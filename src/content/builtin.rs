/// A snippet shipped with the binary. `legacy_id` is the identifier older
/// history files used before content ids existed.
pub struct BuiltinSnippet {
    pub legacy_id: &'static str,
    pub language: &'static str,
    pub topics: &'static [&'static str],
    pub code: &'static str,
}

pub const BUILTIN_SNIPPETS: &[BuiltinSnippet] = &[
    // Rust
    BuiltinSnippet {
        legacy_id: "rust_01",
        language: "rust",
        topics: &["basics"],
        code: "let mut x = 0;\nx += 1;",
    },
    BuiltinSnippet {
        legacy_id: "rust_02",
        language: "rust",
        topics: &["basics"],
        code: "use std::collections::HashMap;",
    },
    BuiltinSnippet {
        legacy_id: "rust_03",
        language: "rust",
        topics: &["functions"],
        code: "fn add(a: i32, b: i32) -> i32 {\n    a + b\n}",
    },
    BuiltinSnippet {
        legacy_id: "rust_04",
        language: "rust",
        topics: &["pattern-matching"],
        code: "match val {\n    Some(x) => x,\n    None => 0,\n}",
    },
    BuiltinSnippet {
        legacy_id: "rust_05",
        language: "rust",
        topics: &["structs"],
        code: "impl Point {\n    fn new(x: f64, y: f64) -> Self {\n        Self { x, y }\n    }\n}",
    },
    BuiltinSnippet {
        legacy_id: "rust_06",
        language: "rust",
        topics: &["iterators", "closures"],
        code: "let result = items\n    .iter()\n    .filter(|x| x > &0)\n    .map(|x| x * 2)\n    .collect::<Vec<_>>();",
    },
    BuiltinSnippet {
        legacy_id: "rust_07",
        language: "rust",
        topics: &["recursion"],
        code: "fn factorial(n: u64) -> u64 {\n    if n <= 1 {\n        1\n    } else {\n        n * factorial(n - 1)\n    }\n}",
    },
    BuiltinSnippet {
        legacy_id: "rust_08",
        language: "rust",
        topics: &["traits", "iterators"],
        code: "impl Iterator for Counter {\n    type Item = u32;\n\n    fn next(&mut self) -> Option<Self::Item> {\n        if self.count < 5 {\n            self.count += 1;\n            Some(self.count)\n        } else {\n            None\n        }\n    }\n}",
    },
    BuiltinSnippet {
        legacy_id: "rust_09",
        language: "rust",
        topics: &["error-handling", "io"],
        code: "fn read_config(path: &Path) -> Result<Config, Box<dyn Error>> {\n    let text = fs::read_to_string(path)?;\n    let mut cfg: Config = toml::from_str(&text)?;\n    if cfg.limits.is_empty() {\n        cfg.limits = vec![Limit { max: 10, min: 0 }];\n    }\n    for (i, l) in cfg.limits.iter_mut().enumerate() {\n        l.max = l.max.max(l.min + (i as u32));\n    }\n    Ok(cfg)\n}",
    },
    BuiltinSnippet {
        legacy_id: "rust_10",
        language: "rust",
        topics: &["generics", "collections"],
        code: "pub fn group_by<K: Hash + Eq, V>(items: Vec<(K, V)>) -> HashMap<K, Vec<V>> {\n    let mut out: HashMap<K, Vec<V>> = HashMap::new();\n    for (k, v) in items {\n        out.entry(k).or_default().push(v);\n    }\n    out\n}\n\n#[test]\nfn groups() {\n    let g = group_by(vec![(1, 'a'), (1, 'b'), (2, 'c')]);\n    assert_eq!(g[&1], vec!['a', 'b']);\n    assert_eq!(g.get(&3).map(|v| v.len()), None);\n}",
    },
    // Python
    BuiltinSnippet {
        legacy_id: "python_01",
        language: "python",
        topics: &["basics"],
        code: "x = [i * 2 for i in range(10)]",
    },
    BuiltinSnippet {
        legacy_id: "python_02",
        language: "python",
        topics: &["functions"],
        code: "def greet(name):\n    return f\"hello {name}\"",
    },
    BuiltinSnippet {
        legacy_id: "python_03",
        language: "python",
        topics: &["collections"],
        code: "data = {\"key\": \"value\", \"count\": 42}",
    },
    BuiltinSnippet {
        legacy_id: "python_04",
        language: "python",
        topics: &["classes"],
        code: "class Point:\n    def __init__(self, x, y):\n        self.x = x\n        self.y = y",
    },
    BuiltinSnippet {
        legacy_id: "python_05",
        language: "python",
        topics: &["error-handling"],
        code: "try:\n    result = process(data)\nexcept ValueError as e:\n    print(f\"error: {e}\")",
    },
    BuiltinSnippet {
        legacy_id: "python_06",
        language: "python",
        topics: &["decorators"],
        code: "def retry(times):\n    def wrap(fn):\n        def inner(*args, **kwargs):\n            for _ in range(times - 1):\n                try:\n                    return fn(*args, **kwargs)\n                except Exception:\n                    pass\n            return fn(*args, **kwargs)\n        return inner\n    return wrap",
    },
    BuiltinSnippet {
        legacy_id: "python_07",
        language: "python",
        topics: &["collections", "comprehensions"],
        code: "counts = {}\nfor word in text.split():\n    counts[word] = counts.get(word, 0) + 1\ntop = sorted(counts.items(), key=lambda kv: (-kv[1], kv[0]))[:5]",
    },
    // JavaScript
    BuiltinSnippet {
        legacy_id: "javascript_01",
        language: "javascript",
        topics: &["basics"],
        code: "const x = 42;",
    },
    BuiltinSnippet {
        legacy_id: "javascript_02",
        language: "javascript",
        topics: &["functions"],
        code: "const add = (a, b) => a + b;",
    },
    BuiltinSnippet {
        legacy_id: "javascript_03",
        language: "javascript",
        topics: &["arrays"],
        code: "const doubled = nums.map(n => n * 2);",
    },
    BuiltinSnippet {
        legacy_id: "javascript_04",
        language: "javascript",
        topics: &["async"],
        code: "async function fetchData(url) {\n    const res = await fetch(url);\n    return await res.json();\n}",
    },
    BuiltinSnippet {
        legacy_id: "javascript_05",
        language: "javascript",
        topics: &["objects", "destructuring"],
        code: "const { name, age, ...rest } = person;\nconst copy = { ...rest, tags: [...(rest.tags ?? [])] };",
    },
    BuiltinSnippet {
        legacy_id: "javascript_06",
        language: "javascript",
        topics: &["classes", "events"],
        code: "class Emitter {\n    constructor() {\n        this.handlers = {};\n    }\n    on(evt, fn) {\n        (this.handlers[evt] ||= []).push(fn);\n    }\n    emit(evt, ...args) {\n        for (const fn of this.handlers[evt] ?? []) {\n            fn(...args);\n        }\n    }\n}",
    },
    BuiltinSnippet {
        legacy_id: "javascript_07",
        language: "javascript",
        topics: &["arrays", "reduce"],
        code: "const byKey = (xs, key) => xs.reduce((acc, x) => {\n    (acc[x[key]] = acc[x[key]] || []).push(x);\n    return acc;\n}, {});",
    },
    // Go
    BuiltinSnippet {
        legacy_id: "go_01",
        language: "go",
        topics: &["basics"],
        code: "x := 42",
    },
    BuiltinSnippet {
        legacy_id: "go_02",
        language: "go",
        topics: &["basics"],
        code: "defer file.Close()",
    },
    BuiltinSnippet {
        legacy_id: "go_03",
        language: "go",
        topics: &["functions"],
        code: "func add(a, b int) int {\n    return a + b\n}",
    },
    BuiltinSnippet {
        legacy_id: "go_04",
        language: "go",
        topics: &["error-handling"],
        code: "if err != nil {\n    return fmt.Errorf(\"open: %w\", err)\n}",
    },
    BuiltinSnippet {
        legacy_id: "go_05",
        language: "go",
        topics: &["structs"],
        code: "type Server struct {\n    Host string\n    Port int\n}",
    },
    BuiltinSnippet {
        legacy_id: "go_06",
        language: "go",
        topics: &["concurrency"],
        code: "ch := make(chan int, 10)\ngo func() {\n    for i := 0; i < 10; i++ {\n        ch <- i * i\n    }\n    close(ch)\n}()\nfor v := range ch {\n    fmt.Println(v)\n}",
    },
    BuiltinSnippet {
        legacy_id: "go_07",
        language: "go",
        topics: &["http", "json"],
        code: "func handle(w http.ResponseWriter, r *http.Request) {\n    var req struct {\n        IDs []int `json:\"ids\"`\n    }\n    if err := json.NewDecoder(r.Body).Decode(&req); err != nil {\n        http.Error(w, err.Error(), http.StatusBadRequest)\n        return\n    }\n    out := map[string]int{\"count\": len(req.IDs)}\n    _ = json.NewEncoder(w).Encode(out)\n}",
    },
];

pub fn builtin_languages() -> Vec<&'static str> {
    let mut langs: Vec<&'static str> = BUILTIN_SNIPPETS.iter().map(|s| s.language).collect();
    langs.sort_unstable();
    langs.dedup();
    langs
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn test_legacy_ids_unique() {
        let ids: HashSet<&str> = BUILTIN_SNIPPETS.iter().map(|s| s.legacy_id).collect();
        assert_eq!(ids.len(), BUILTIN_SNIPPETS.len());
    }

    #[test]
    fn test_legacy_ids_prefixed_by_language() {
        for s in BUILTIN_SNIPPETS {
            assert!(s.legacy_id.starts_with(s.language), "{}", s.legacy_id);
        }
    }

    #[test]
    fn test_builtin_languages() {
        assert_eq!(builtin_languages(), vec!["go", "javascript", "python", "rust"]);
    }
}
