//! Casos de extremo a extremo sobre programas Rat25S completos.

use indoc::indoc;
use rat25s::{compile, Compilation};

fn listing(compilation: &Compilation) -> Vec<String> {
    compilation
        .listing
        .instructions()
        .iter()
        .map(ToString::to_string)
        .collect()
}

fn globals(compilation: &Compilation) -> Vec<(String, u32, String)> {
    compilation
        .symbols
        .globals()
        .map(|(name, global)| (name.to_owned(), global.address, global.ty.to_string()))
        .collect()
}

#[test]
fn single_assignment_lowers_to_push_and_pop() {
    let compilation = compile("integer x; x = 5;");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        globals(&compilation),
        vec![("x".to_owned(), 10000, "integer".to_owned())]
    );
    assert_eq!(listing(&compilation), vec!["PUSHI     5", "POPM      10000"]);
}

#[test]
fn expressions_read_globals_by_cell() {
    let compilation = compile("integer a, b; a = 1; b = a + 2;");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        globals(&compilation),
        vec![
            ("a".to_owned(), 10000, "integer".to_owned()),
            ("b".to_owned(), 10001, "integer".to_owned()),
        ]
    );
    assert_eq!(
        listing(&compilation),
        vec![
            "PUSHI     1",
            "POPM      10000",
            "PUSHM     10000",
            "PUSHI     2",
            "A",
            "POPM      10001",
        ]
    );
}

#[test]
fn scan_then_print_round_trips_through_memory() {
    let compilation = compile("integer n; scan(n); print(n);");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        listing(&compilation),
        vec!["SIN", "POPM      10000", "PUSHM     10000", "SOUT"]
    );
}

#[test]
fn scan_pops_targets_in_reverse_textual_order() {
    let compilation = compile("integer a, b; scan(a, b);");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        listing(&compilation),
        vec!["SIN", "POPM      10001", "POPM      10000"]
    );
}

#[test]
fn if_else_patches_both_jumps() {
    let compilation = compile("integer x; if (x == 0) x = 1; else x = 2; endif");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        listing(&compilation),
        vec![
            "PUSHM     10000",
            "PUSHI     0",
            "EQU",
            "JMP0      8",
            "PUSHI     1",
            "POPM      10000",
            "JMP       11",
            "LABEL",
            "PUSHI     2",
            "POPM      10000",
            "LABEL",
        ]
    );
}

#[test]
fn while_jumps_back_to_its_condition_label() {
    let compilation = compile("integer i; i = 3; while (i > 0) i = i - 1; endwhile");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        listing(&compilation),
        vec![
            "PUSHI     3",
            "POPM      10000",
            "LABEL",
            "PUSHM     10000",
            "PUSHI     0",
            "GRT",
            "JMP0      13",
            "PUSHM     10000",
            "PUSHI     1",
            "S",
            "POPM      10000",
            "JMP       3",
            "LABEL",
        ]
    );
}

#[test]
fn boolean_accepts_bare_literal_one() {
    let compilation = compile("boolean b; b = 1;");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(listing(&compilation), vec!["PUSHI     1", "POPM      10000"]);
}

#[test]
fn boolean_rejects_arithmetic_results() {
    let compilation = compile("boolean b; integer x; b = x + 0;");

    assert!(compilation.diagnostics.iter().any(|diagnostic| {
        diagnostic.message == "Type mismatch: Cannot assign integer value to boolean variable 'b'"
    }));
}

#[test]
fn boolean_literals_lower_to_one_and_zero() {
    let compilation = compile("boolean b; boolean c; b = true; c = false;");

    assert_eq!(compilation.error_count(), 0);
    assert_eq!(
        listing(&compilation),
        vec![
            "PUSHI     1",
            "POPM      10000",
            "PUSHI     0",
            "POPM      10001",
        ]
    );
}

#[test]
fn nested_control_flow_resolves_every_jump() {
    let source = indoc! {"
        integer i, x;
        i = 0;
        while (i < 10)
        {
            if (x == 0)
                x = x + 1;
            else
                while (x > 0)
                    x = x - 1;
                endwhile
            endif
            i = i + 1;
        }
        endwhile
    "};

    let compilation = compile(source);
    assert_eq!(compilation.error_count(), 0);
    assert!(!compilation.listing.has_unresolved_jumps());

    // Todo destino es un slot 1-based válido dentro del listado
    let total = compilation.listing.instructions().len();
    for instruction in compilation.listing.instructions() {
        let rendered = instruction.to_string();
        if let Some(operand) = rendered
            .strip_prefix("JMP0      ")
            .or_else(|| rendered.strip_prefix("JMP       "))
        {
            let slot: usize = operand.parse().expect("operando de salto no numérico");
            assert!(slot >= 1 && slot <= total, "destino fuera de rango: {slot}");
        }
    }
}

#[test]
fn functions_type_check_without_emitting_frames() {
    let source = indoc! {"
        function double(n integer)
        {
            return n;
        }

        integer x;
        x = double(4);
        print(x);
    "};

    let compilation = compile(source);
    assert_eq!(compilation.error_count(), 0);

    // La llamada no emite instrucciones de marco; solo quedan el
    // argumento, la asignación y la impresión
    assert_eq!(
        listing(&compilation),
        vec![
            "PUSHI     4",
            "POPM      10000",
            "PUSHM     10000",
            "SOUT",
        ]
    );
}

#[test]
fn error_count_matches_trace_error_lines() {
    let compilation = compile("boolean b; integer x; b = x + 0; y = 2;");

    let error_lines = compilation
        .trace
        .iter()
        .filter(|line| line.starts_with("Syntax error at line "))
        .count();

    assert!(compilation.error_count() > 0);
    assert_eq!(error_lines, compilation.error_count());

    let reported: Vec<String> = compilation
        .diagnostics
        .iter()
        .map(ToString::to_string)
        .collect();
    for line in reported {
        assert!(compilation.trace.contains(&line));
    }
}

#[test]
fn clean_parse_leaves_no_unresolved_targets() {
    let source = indoc! {"
        integer a, b;
        scan(a);
        if (a => 1)
            b = a * 2;
        else
            b = 0;
        endif
        print(b);
        $$
    "};

    let compilation = compile(source);
    assert_eq!(compilation.error_count(), 0);
    assert!(!compilation.listing.has_unresolved_jumps());
}

#[test]
fn compilation_is_idempotent() {
    let source = indoc! {"
        /* contador */
        integer n;
        scan(n);
        while (n > 0)
        {
            print(n);
            n = n - 1;
        }
        endwhile
    "};

    let first = compile(source);
    let second = compile(source);

    assert_eq!(first.trace, second.trace);
    assert_eq!(listing(&first), listing(&second));
    assert_eq!(globals(&first), globals(&second));
    assert_eq!(first.error_count(), second.error_count());
}
