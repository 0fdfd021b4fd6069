#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::include::IncludePolicy;
    use indoc::indoc;
    use std::path::Path;

    fn preprocess(input: &str) -> PreprocessOutput {
        Preprocessor::new().preprocess(input, Path::new("test.c"), &MemoryFileLoader::new())
    }

    fn preprocess_with(
        pp: &Preprocessor,
        loader: &MemoryFileLoader,
        input: &str,
    ) -> PreprocessOutput {
        pp.preprocess(input, Path::new("test.c"), loader)
    }

    #[test]
    fn test_basic_passthrough() {
        let input = "int main() { return 0; }\n";
        let out = preprocess(input);
        assert_eq!(out.text, input);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_macro_free_input_is_byte_identical() {
        let input = indoc! {"
            int main(void) {
                int x = 1;

                return   x;
            }
        "};
        let out = preprocess(input);
        assert_eq!(out.text, input);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_simple_define() {
        let input = indoc! {"
            #define MAX 100
            int array[MAX];
        "};
        let out = preprocess(input);
        assert_eq!(out.text, "\nint array[100];\n");
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn test_directive_lines_leave_blank_lines() {
        let input = indoc! {"
            #define A 1
            #define B 2
            int x = A + B;
        "};
        let out = preprocess(input);
        // Two elided directive lines keep line 3 on line 3.
        assert_eq!(out.text, "\n\nint x = 1 + 2;\n");
    }

    #[test]
    fn test_nested_function_like_expansion() {
        let input = indoc! {"
            #define SQ(x) ((x)*(x))
            int result = SQ(SQ(2));
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text, "\nint result = ((((2)*(2)))*(((2)*(2))));\n");
    }

    #[test]
    fn test_self_referential_macro_expands_once() {
        let input = indoc! {"
            #define A A
            A
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text, "\nA\n");
    }

    #[test]
    fn test_mutually_recursive_macros_terminate() {
        let input = indoc! {"
            #define F G
            #define G F
            F G
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text, "\n\nF G\n");
    }

    #[test]
    fn test_identical_redefinition_is_silent() {
        let input = indoc! {"
            #define N 1
            #define N 1
            N
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains('1'));
    }

    #[test]
    fn test_conflicting_redefinition_keeps_first() {
        let input = indoc! {"
            #define N 1
            #define N 2
            int x = N;
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Error);
        assert_eq!(out.diagnostics[0].line, 2);
        assert!(out.text.contains("int x = 1;"));
    }

    #[test]
    fn test_undef_allows_redefinition() {
        let input = indoc! {"
            #define X 1
            #undef X
            #define X 2
            int x = X;
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("int x = 2;"));
    }

    #[test]
    fn test_stringize_and_paste() {
        let input = indoc! {"
            #define STR(x) #x
            #define CAT(a, b) a##b
            const char *s = STR(hello world);
            int CAT(foo, bar) = 1;
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("\"hello world\""));
        assert!(out.text.contains("foobar"));
    }

    #[test]
    fn test_invalid_paste_reports_error() {
        let input = indoc! {"
            #define CAT(a, b) a##b
            CAT(+, /)
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Error);
        assert!(out.diagnostics[0].message.contains("valid preprocessing token"));
    }

    #[test]
    fn test_variadic_macro() {
        let input = indoc! {"
            #define LOG(fmt, ...) printf(fmt, __VA_ARGS__)
            LOG(\"%d %d\", 1, 2);
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("printf(\"%d %d\",1,2);"));
    }

    #[test]
    fn test_argument_count_mismatch() {
        let input = indoc! {"
            #define PAIR(a, b) a b
            PAIR(1)
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert!(out.diagnostics[0].message.contains("expects 2 arguments, got 1"));
        // The invocation is left in the output untouched.
        assert!(out.text.contains("PAIR"));
    }

    #[test]
    fn test_invocation_spanning_lines() {
        let input = indoc! {"
            #define ADD(a, b) ((a)+(b))
            int x = ADD(1,
                        2);
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("((1)+(2))"));
    }

    #[test]
    fn test_if_arithmetic() {
        let input = indoc! {"
            #if 1 + 1 == 2
            int yes;
            #else
            int no;
            #endif
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("yes"));
        assert!(!out.text.contains("no"));
    }

    #[test]
    fn test_undefined_identifier_evaluates_to_zero() {
        let input = indoc! {"
            #if SOME_UNDEFINED_THING
            int yes;
            #endif
            int after;
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(!out.text.contains("yes"));
        assert!(out.text.contains("after"));
    }

    #[test]
    fn test_defined_operator() {
        let input = indoc! {"
            #define X
            #if defined(X) && !defined(Y)
            int ok;
            #endif
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("ok"));
    }

    #[test]
    fn test_elif_chain_takes_first_true_branch() {
        let input = indoc! {"
            #if 0
            int a;
            #elif 1
            int b;
            #elif 1
            int c;
            #else
            int d;
            #endif
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("int b;"));
        assert!(!out.text.contains("int a;"));
        assert!(!out.text.contains("int c;"));
        assert!(!out.text.contains("int d;"));
    }

    #[test]
    fn test_ifdef_and_ifndef() {
        let input = indoc! {"
            #define FOO
            #ifdef FOO
            int have_foo;
            #endif
            #ifndef BAR
            int no_bar;
            #endif
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("have_foo"));
        assert!(out.text.contains("no_bar"));
    }

    #[test]
    fn test_macro_in_condition() {
        let input = indoc! {"
            #define LIMIT 10
            #if LIMIT > 5
            int big;
            #endif
        "};
        let out = preprocess(input);
        assert!(out.text.contains("big"));
    }

    #[test]
    fn test_division_by_zero_in_condition() {
        let input = indoc! {"
            #if 1 / 0
            int x;
            #endif
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(!out.text.contains("int x;"));
    }

    #[test]
    fn test_unterminated_if() {
        let input = indoc! {"
            #if 1
            int x;
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(out.diagnostics[0].message.contains("#endif"));
        // Content of the open branch is still emitted.
        assert!(out.text.contains("int x;"));
    }

    #[test]
    fn test_endif_without_if() {
        let out = preprocess("#endif\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
    }

    #[test]
    fn test_else_without_if() {
        let out = preprocess("#else\nint x;\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(out.diagnostics[0].message.contains("#else without matching #if"));
    }

    #[test]
    fn test_elif_without_if() {
        let out = preprocess("#elif 1\nint x;\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(out.diagnostics[0].message.contains("#elif without matching #if"));
    }

    #[test]
    fn test_duplicate_else() {
        let input = indoc! {"
            #if 0
            int a;
            #else
            int b;
            #else
            int c;
            #endif
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(out.diagnostics[0].message.contains("multiple #else"));
        assert_eq!(out.diagnostics[0].line, 5);
        // The first #else branch was taken.
        assert!(out.text.contains("int b;"));
        assert!(!out.text.contains("int a;"));
    }

    #[test]
    fn test_elif_after_else() {
        let input = indoc! {"
            #if 1
            int a;
            #else
            int b;
            #elif 1
            int c;
            #endif
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(out.diagnostics[0].message.contains("#elif after #else"));
        assert!(out.text.contains("int a;"));
        assert!(!out.text.contains("int b;"));
        assert!(!out.text.contains("int c;"));
    }

    #[test]
    fn test_inactive_branch_reports_nothing() {
        // '@' would be an unhandled character and '#frobnicate' an unknown
        // directive, but both sit in a skipped branch.
        let input = indoc! {"
            #if 0
            @ @ @
            #frobnicate
            #endif
            int x;
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("int x;"));
    }

    #[test]
    fn test_unknown_directive() {
        let out = preprocess("#frobnicate\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::SyntaxError);
        assert!(out.diagnostics[0].message.contains("frobnicate"));
    }

    #[test]
    fn test_null_directive_is_elided() {
        let out = preprocess("#\nint x;\n");
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text, "\nint x;\n");
    }

    #[test]
    fn test_error_and_warning_directives() {
        let input = indoc! {"
            #error bad config
            #warning heads up
            int x;
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 2);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Error);
        assert!(out.diagnostics[0].message.contains("bad config"));
        assert_eq!(out.diagnostics[1].kind, DiagnosticKind::Warning);
        assert!(out.diagnostics[1].message.contains("heads up"));
        // Processing continues past #error.
        assert!(out.text.contains("int x;"));
    }

    #[test]
    fn test_redefining_builtin_warns() {
        let out = preprocess("#define __LINE__ 5\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Warning);
    }

    #[test]
    fn test_builtin_line_and_file() {
        let input = indoc! {"
            int l = __LINE__;
            const char *f = __FILE__;
        "};
        let out = preprocess(input);
        assert!(out.text.contains("int l = 1;"));
        assert!(out.text.contains("\"test.c\""));
    }

    #[test]
    fn test_counter_increments_across_uses() {
        let input = indoc! {"
            int a = __COUNTER__;
            int b = __COUNTER__;
        "};
        let out = preprocess(input);
        assert!(out.text.contains("int a = 0;"));
        assert!(out.text.contains("int b = 1;"));
    }

    #[test]
    fn test_line_directive_overrides_builtins() {
        let input = indoc! {"
            #line 100 \"other.c\"
            int l = __LINE__;
            const char *f = __FILE__;
        "};
        let out = preprocess(input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("int l = 100;"));
        assert!(out.text.contains("\"other.c\""));
    }

    #[test]
    fn test_missing_include_continues() {
        let input = indoc! {"
            #include \"nope.h\"
            int x;
        "};
        let out = preprocess(input);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::MissingHeader);
        assert!(out.diagnostics[0].message.contains("\"nope.h\""));
        assert!(out.text.contains("int x;"));
    }

    #[test]
    fn test_quote_include_resolves_relative_to_includer() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("src/a.h", "int from_a;\n");
        let pp = Preprocessor::new();
        let out = pp.preprocess(
            "#include \"a.h\"\nint main;\n",
            Path::new("src/test.c"),
            &loader,
        );
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("from_a"));
    }

    #[test]
    fn test_angle_include_uses_search_paths() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("sys/stdio.h", "int sys_marker;\n");
        let mut pp = Preprocessor::new();
        pp.add_include_dir("sys".into());
        let out = preprocess_with(&pp, &loader, "#include <stdio.h>\n");
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("sys_marker"));
    }

    #[test]
    fn test_macro_expanded_include() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("via.h", "int via_macro;\n");
        let input = indoc! {"
            #define HDR \"via.h\"
            #include HDR
        "};
        let out = preprocess_with(&Preprocessor::new(), &loader, input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("via_macro"));
    }

    #[test]
    fn test_include_guard() {
        let mut loader = MemoryFileLoader::new();
        loader.insert(
            "guarded.h",
            indoc! {"
                #ifndef GUARDED_H
                #define GUARDED_H
                int guarded_once;
                #endif
            "},
        );
        let input = indoc! {"
            #include \"guarded.h\"
            #include \"guarded.h\"
        "};
        let out = preprocess_with(&Preprocessor::new(), &loader, input);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text.matches("guarded_once").count(), 1);
    }

    #[test]
    fn test_pragma_once() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("once.h", "#pragma once\nint only_once;\n");
        let input = indoc! {"
            #include \"once.h\"
            #include \"once.h\"
        "};
        let out = preprocess_with(&Preprocessor::new(), &loader, input);
        assert!(out.diagnostics.is_empty());
        assert_eq!(out.text.matches("only_once").count(), 1);
    }

    #[test]
    fn test_unguarded_header_included_twice() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("plain.h", "int repeated;\n");
        let input = indoc! {"
            #include \"plain.h\"
            #include \"plain.h\"
        "};
        let out = preprocess_with(&Preprocessor::new(), &loader, input);
        assert_eq!(out.text.matches("repeated").count(), 2);
    }

    #[test]
    fn test_include_depth_cap() {
        let mut loader = MemoryFileLoader::new();
        for n in 0..249 {
            loader.insert(format!("d{}.h", n), format!("#include \"d{}.h\"\n", n + 1));
        }
        loader.insert("d249.h", "int bottom;\n");
        let input = indoc! {"
            #include \"d0.h\"
            int after_chain;
        "};
        let out = preprocess_with(&Preprocessor::new(), &loader, input);
        let deep: Vec<_> = out
            .diagnostics
            .iter()
            .filter(|d| d.kind == DiagnosticKind::IncludeNestedTooDeeply)
            .collect();
        // The chain is cut once, at the cap; the rest of the batch goes on.
        assert_eq!(deep.len(), 1);
        assert!(!out.text.contains("bottom"));
        assert!(out.text.contains("after_chain"));
    }

    #[test]
    fn test_cached_includes_report_lex_diagnostics_once() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("bad.h", "@\n");
        let input = indoc! {"
            #include \"bad.h\"
            #include \"bad.h\"
        "};

        let out = preprocess_with(&Preprocessor::new(), &loader, input);
        let unhandled = |o: &PreprocessOutput| {
            o.diagnostics
                .iter()
                .filter(|d| d.kind == DiagnosticKind::UnhandledChar)
                .count()
        };
        assert_eq!(unhandled(&out), 2);

        let mut pp = Preprocessor::new();
        pp.set_include_policy(IncludePolicy::CacheByPath);
        let out = preprocess_with(&pp, &loader, input);
        assert_eq!(unhandled(&out), 1);
    }

    #[test]
    fn test_command_line_defines() {
        let mut pp = Preprocessor::new();
        pp.define("FOO".into(), Some("41 + 1".into()));
        pp.define("FLAG".into(), None);
        let input = indoc! {"
            #if FOO == 42 && FLAG
            int ok;
            #endif
        "};
        let out = preprocess_with(&pp, &MemoryFileLoader::new(), input);
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("ok"));
    }

    #[test]
    fn test_invalid_command_line_define_name() {
        let mut pp = Preprocessor::new();
        pp.define("1BAD".into(), None);
        let out = preprocess_with(&pp, &MemoryFileLoader::new(), "int x;\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::Error);
    }

    #[test]
    fn test_force_undefine_suppresses_source_define() {
        let mut pp = Preprocessor::new();
        pp.undefine("DEBUG".into());
        let input = indoc! {"
            #define DEBUG 1
            #ifdef DEBUG
            int dbg;
            #endif
            int end;
        "};
        let out = preprocess_with(&pp, &MemoryFileLoader::new(), input);
        assert!(out.diagnostics.is_empty());
        assert!(!out.text.contains("dbg"));
        assert!(out.text.contains("int end;"));
    }

    #[test]
    fn test_forced_include() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("prelude.h", "#define FROM_PRELUDE 7\n");
        let mut pp = Preprocessor::new();
        pp.add_force_include("prelude.h".into());
        let out = preprocess_with(&pp, &loader, "int x = FROM_PRELUDE;\n");
        assert!(out.diagnostics.is_empty());
        assert!(out.text.contains("int x = 7;"));
    }

    #[test]
    fn test_missing_forced_include() {
        let mut pp = Preprocessor::new();
        pp.add_force_include("gone.h".into());
        let out = preprocess_with(&pp, &MemoryFileLoader::new(), "int x;\n");
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].kind, DiagnosticKind::MissingHeader);
        assert!(out.text.contains("int x;"));
    }

    #[test]
    fn test_keep_comments() {
        let mut pp = Preprocessor::new();
        pp.set_keep_comments(true);
        let out = preprocess_with(&pp, &MemoryFileLoader::new(), "int x; // keep me\n");
        assert_eq!(out.text, "int x; // keep me\n");
    }

    #[test]
    fn test_comments_elided_by_default() {
        let out = preprocess("int x; // gone\nint y; /* also gone */\n");
        assert!(!out.text.contains("gone"));
        assert!(out.text.contains("int x;"));
        assert!(out.text.contains("int y;"));
    }

    #[test]
    fn test_line_markers_at_include_boundaries() {
        let mut loader = MemoryFileLoader::new();
        loader.insert("a.h", "int inner;\n");
        let mut pp = Preprocessor::new();
        pp.set_line_markers(true);
        let input = indoc! {"
            int before;
            #include \"a.h\"
            int after;
        "};
        let out = preprocess_with(&pp, &loader, input);
        assert!(out.text.contains("#line 1 \"a.h\""));
        assert!(out.text.contains("#line 3 \"test.c\""));
        assert!(out.text.contains("int inner;"));
    }

    #[test]
    fn test_output_reprocesses_to_itself() {
        let input = indoc! {"
            #define SQ(x) ((x)*(x))
            #define LIMIT 4
            #if LIMIT > 2
            int result = SQ(3);
            #endif
            int plain;
        "};
        let first = preprocess(input);
        assert!(first.diagnostics.is_empty());
        let second = preprocess(&first.text);
        assert!(second.diagnostics.is_empty());
        assert_eq!(second.text, first.text);
    }
}
