//! Integration tests for the ABC compiler front-end.
//!
//! Exercises the full pipeline end to end: scanner round-trips, parser
//! totality, beam grouping, analyzer results and the ABCT scanner.

use abc::{
    analyze, compile, desanitize, parse, sanitize, scan, scan_abct, ErrorKind, Expr, SemanticData,
    SourceContext, Token, TokenKind,
};

fn count_error_nodes(exprs: &[Expr]) -> usize {
    exprs
        .iter()
        .map(|e| match e {
            Expr::Error(_) => 1,
            Expr::Tune(t) => {
                count_error_nodes(&t.header.info_lines)
                    + t.body
                        .as_ref()
                        .map(|b| b.systems.iter().map(|s| count_error_nodes(s)).sum())
                        .unwrap_or(0)
            }
            Expr::Beam(b) => count_error_nodes(&b.contents),
            Expr::Chord(c) => count_error_nodes(&c.contents),
            Expr::GraceGroup(g) => count_error_nodes(&g.notes),
            _ => 0,
        })
        .sum()
}

#[test]
fn test_abct_fence_scenario() {
    let mut ctx = SourceContext::new();
    let tokens = scan_abct("```abc\nCDEF GABc\n```", &mut ctx);
    let pairs: Vec<(TokenKind, &str)> = tokens.iter().map(|t| (t.kind, t.lexeme.as_str())).collect();
    assert_eq!(
        pairs,
        vec![
            (TokenKind::AbcFenceOpen, "```abc\n"),
            (TokenKind::AbcContent, "CDEF GABc\n"),
            (TokenKind::AbcFenceClose, "```"),
            (TokenKind::Eof, ""),
        ]
    );
}

#[test]
fn test_abct_keyword_scenario() {
    let mut ctx = SourceContext::new();
    let tokens = scan_abct("@notes and @rests or not @chords", &mut ctx);
    let kinds: Vec<TokenKind> = tokens.iter().map(|t| t.kind).collect();
    assert_eq!(
        kinds,
        vec![
            TokenKind::At,
            TokenKind::Identifier,
            TokenKind::Ws,
            TokenKind::And,
            TokenKind::Ws,
            TokenKind::At,
            TokenKind::Identifier,
            TokenKind::Ws,
            TokenKind::Or,
            TokenKind::Ws,
            TokenKind::Not,
            TokenKind::Ws,
            TokenKind::At,
            TokenKind::Identifier,
            TokenKind::Eof,
        ]
    );
}

#[test]
fn test_tune_with_beam_scenario() {
    let result = compile("X:1\nT:Test\nK:C\nCDEF|\n");
    assert!(result.diagnostics.is_empty());
    let tune = result
        .ast
        .contents
        .iter()
        .find_map(|e| match e {
            Expr::Tune(t) => Some(t),
            _ => None,
        })
        .expect("tune");
    let info_lines = tune
        .header
        .info_lines
        .iter()
        .filter(|e| matches!(e, Expr::InfoLine(_)))
        .count();
    assert_eq!(info_lines, 3);
    let body = tune.body.as_ref().expect("body");
    assert_eq!(body.systems.len(), 1);
    let system = &body.systems[0];
    let beam = match &system[0] {
        Expr::Beam(b) => b,
        other => panic!("expected beam, got {other:?}"),
    };
    assert_eq!(
        beam.contents
            .iter()
            .filter(|e| matches!(e, Expr::Note(_)))
            .count(),
        4
    );
    assert!(matches!(&system[1], Expr::BarLine(_)));
}

#[test]
fn test_tempo_scenario() {
    let result = compile("X:1\nT:Test\nQ:1/4=120\nK:C\nCDEF|");
    assert!(result.diagnostics.is_empty());
    let tune = result
        .ast
        .contents
        .iter()
        .find_map(|e| match e {
            Expr::Tune(t) => Some(t),
            _ => None,
        })
        .expect("tune");
    let q_line = tune
        .header
        .info_lines
        .iter()
        .find_map(|e| match e {
            Expr::InfoLine(line) if line.key.lexeme.starts_with('Q') => Some(line),
            _ => None,
        })
        .expect("Q: line");
    let tempo = match result.semantics.get(&q_line.id) {
        Some(SemanticData::Tempo(t)) => t,
        other => panic!("expected tempo on the Q: node, got {other:?}"),
    };
    assert_eq!(tempo.bpm, Some(120));
    assert_eq!(tempo.duration, Some((1, 4)));
}

#[test]
fn test_constrained_directive_scenario() {
    let result = compile("%%stretchlast 2\n\nX:1\nK:C\nCDEF|");
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message == "Number 2 is above maximum 1"));
    let directive_id = result
        .ast
        .header
        .as_ref()
        .and_then(|h| {
            h.contents.iter().find_map(|e| match e {
                Expr::Directive(d) => Some(d.id),
                _ => None,
            })
        })
        .expect("directive");
    assert!(result.semantics.get(&directive_id).is_none());
}

#[test]
fn test_file_header_key_scenario() {
    let result = compile("K:C\n\nX:1\nT:t\nK:G\nCD|\n");
    assert!(result
        .diagnostics
        .iter()
        .any(|d| d.message == "K: not allowed in file header"));
    let tunes = result
        .ast
        .contents
        .iter()
        .filter(|e| matches!(e, Expr::Tune(_)))
        .count();
    assert_eq!(tunes, 1);
    assert_eq!(count_error_nodes(&result.ast.contents), 0);
}

#[test]
fn test_scanner_round_trip_property() {
    let sources = [
        "X:1\nT:Round Trip\nC:Trad.\nM:6/8\nL:1/8\nQ:\"Lively\" 3/8=96\nV:T1 name=\"Tenor\" clef=treble\nK:D mix clef=bass3-8 middle=d\n|:D2E F>GA|{/c}d2 [DFA]2 z2:|1 DEF|2 dcB|]\nw:round and round\n%%staffsep 42pt\n\nX:2\nK:none\n(3abc y2 &\\x02invalid\n",
        "%%titlefont Times-Roman 14 box\n% comment\nfree text line\n\nX:1\nK:C\nC\n",
        "",
        "no music here at all",
        "X:1\nK:C\r\nC2>D\r\n",
    ];
    for source in sources {
        let mut ctx = SourceContext::new();
        let tokens = scan(source, &mut ctx);
        assert_eq!(Token::join(&tokens), source, "round trip for {source:?}");
    }
}

#[test]
fn test_abct_round_trip_property() {
    let sources = [
        "let x = 1/2\nfn f => @notes |= out # done\n",
        "```abc:10:2-12\nX:1\nK:C\nCDEF|\n```\n\"str \\\" esc\" `CDE` {a, b}\n",
        "over [1, 2] match x\n",
    ];
    for source in sources {
        let mut ctx = SourceContext::new();
        let tokens = scan_abct(source, &mut ctx);
        assert_eq!(Token::join(&tokens), source, "round trip for {source:?}");
    }
}

#[test]
fn test_sanitize_round_trip_property() {
    for s in [
        "",
        "CDEF|",
        "has # comment markers",
        "inline ``` fence ``` twice",
        "#```#",
    ] {
        assert_eq!(desanitize(&sanitize(s)), s, "{s:?}");
    }
}

#[test]
fn test_parser_totality_property() {
    // parser errors present exactly when error nodes are present
    let cases = [
        ("X:1\nK:C\nCDEF|\n", false),
        ("X:1\nK:C\nC ??? D\n", true),
        ("X:1\nnot an info line\nK:C\nC|\n", true),
        ("X:1\nK:C\n[CE\nGA|\n", false), // unterminated chord reports but recovers without an error node
    ];
    for (source, expect_error_nodes) in cases {
        let mut ctx = SourceContext::new();
        let tokens = scan(source, &mut ctx);
        let ast = parse(tokens, &mut ctx);
        let error_nodes = count_error_nodes(&ast.contents)
            + ast
                .header
                .as_ref()
                .map(|h| count_error_nodes(&h.contents))
                .unwrap_or(0);
        assert_eq!(
            error_nodes > 0,
            expect_error_nodes,
            "error nodes for {source:?}"
        );
        if expect_error_nodes {
            assert!(ctx.reporter.count_of(ErrorKind::Parser) > 0);
        }
    }
}

#[test]
fn test_analyzer_coverage_property() {
    // every directive category with valid parameters produces an entry
    let samples = [
        "%%titlefont Times 12",
        "%%vocalfont * 14",
        "%%flatbeams",
        "%%papersize A4",
        "%%graceslurs true",
        "%%scale 0.8",
        "%%stretchlast 1",
        "%%barsperstaff 4",
        "%%measurenb 0",
        "%%setbarnb 2",
        "%%vocal above",
        "%%topmargin 2cm",
        "%%sep 10 10 120",
        "%%text anything at all",
        "%%abc-version 2.1",
        "%%newpage 2",
    ];
    for directive in samples {
        let source = format!("{directive}\n\nX:1\nK:C\nC|\n");
        let result = compile(&source);
        assert!(
            result.diagnostics.is_empty(),
            "unexpected diagnostics for {directive}: {:?}",
            result.diagnostics
        );
        let id = result
            .ast
            .header
            .as_ref()
            .and_then(|h| {
                h.contents.iter().find_map(|e| match e {
                    Expr::Directive(d) => Some(d.id),
                    _ => None,
                })
            })
            .expect("directive node");
        assert!(
            result.semantics.contains_key(&id),
            "no semantic entry for {directive}"
        );
    }
}

#[test]
fn test_node_ids_unique_and_dense() {
    let mut ctx = SourceContext::new();
    let tokens = scan("X:1\nT:ids\nK:C\nCDEF| GA|\n", &mut ctx);
    let token_count = tokens.len() as u32;
    let ast = parse(tokens, &mut ctx);
    let _ = analyze(&ast, &mut ctx);
    // every issued id is unique and the sequence has no holes
    let mut ids = Vec::new();
    collect_ids(&Expr::FileStructure(ast), &mut ids);
    ids.sort_unstable();
    let before = ids.len();
    ids.dedup();
    assert_eq!(before, ids.len(), "duplicate node ids");
    // node ids continue after the token ids with no gaps
    let max = *ids.last().expect("ids");
    let node_ids: Vec<u32> = ids.into_iter().filter(|id| *id > token_count).collect();
    let expected: Vec<u32> = (token_count + 1..=max).collect();
    assert_eq!(node_ids, expected);
}

fn collect_ids(expr: &Expr, ids: &mut Vec<u32>) {
    ids.push(expr.id());
    match expr {
        Expr::FileStructure(e) => {
            if let Some(h) = &e.header {
                ids.push(h.id);
                for c in &h.contents {
                    collect_ids(c, ids);
                }
            }
            for c in &e.contents {
                collect_ids(c, ids);
            }
        }
        Expr::Tune(t) => {
            ids.push(t.header.id);
            for c in &t.header.info_lines {
                collect_ids(c, ids);
            }
            if let Some(b) = &t.body {
                ids.push(b.id);
                for s in &b.systems {
                    for c in s {
                        collect_ids(c, ids);
                    }
                }
            }
        }
        Expr::InfoLine(l) => {
            for c in &l.value {
                collect_ids(c, ids);
            }
        }
        Expr::Directive(d) => {
            for c in &d.value {
                collect_ids(c, ids);
            }
        }
        Expr::Note(n) => {
            match &n.head {
                abc::NoteHead::Pitch(p) => ids.push(p.id),
                abc::NoteHead::Rest(r) => ids.push(r.id),
            }
            if let Some(rhythm) = &n.rhythm {
                ids.push(rhythm.id);
            }
        }
        Expr::Chord(c) => {
            for e in &c.contents {
                collect_ids(e, ids);
            }
            if let Some(rhythm) = &c.rhythm {
                ids.push(rhythm.id);
            }
        }
        Expr::GraceGroup(g) => {
            for e in &g.notes {
                collect_ids(e, ids);
            }
        }
        Expr::YSpacer(y) => {
            if let Some(rhythm) = &y.rhythm {
                ids.push(rhythm.id);
            }
        }
        Expr::InlineField(f) => {
            ids.push(f.field.id);
            for c in &f.field.value {
                collect_ids(c, ids);
            }
        }
        Expr::Beam(b) => {
            for c in &b.contents {
                collect_ids(c, ids);
            }
        }
        Expr::KeyValue(kv) => collect_ids(&kv.value, ids),
        Expr::Binary(b) => {
            collect_ids(&b.lhs, ids);
            collect_ids(&b.rhs, ids);
        }
        Expr::Grouping(g) => collect_ids(&g.inner, ids),
        Expr::LyricSection(s) => {
            for e in &s.lines {
                collect_ids(e, ids);
            }
        }
        _ => {}
    }
}

#[test]
fn test_multi_tune_file_with_abct_driver() {
    // an ABCT script whose fence body is itself valid ABC
    let script = "load \"tunes.abc\"\n```abc\nX:1\nK:C\nCDEF|\n```\n@notes => out\n";
    let mut ctx = SourceContext::new();
    let tokens = scan_abct(script, &mut ctx);
    assert!(!ctx.has_errors());
    let content = tokens
        .iter()
        .find(|t| t.kind == TokenKind::AbcContent)
        .expect("fence content");
    // the embedded ABC compiles on its own
    let embedded = compile(&desanitize(&content.lexeme));
    assert!(embedded.diagnostics.is_empty());
    let tunes = embedded
        .ast
        .contents
        .iter()
        .filter(|e| matches!(e, Expr::Tune(_)))
        .count();
    assert_eq!(tunes, 1);
}
