
use serde_json::Value;

use self::fixtures::AstBuilder;
use crate::analysis::fixed_point::{self, SolverStrategy};
use crate::analysis::{self, Algorithm, ReachingDefinitions};
use crate::cfg::{Branch, ControlFlowGraph, NodeKind};
use crate::{Error, OptionsBuilder, Program};

fn id(value: &Value) -> u64 {
    value["id"].as_u64().unwrap()
}

fn program(ast: &AstBuilder, contracts: Vec<Value>) -> Program {
    Program::from_json(&ast.source_unit(contracts), "").unwrap()
}

/// The graph of the only function of a single contract `C`.
fn single_function(ast: &AstBuilder, body: Value) -> ControlFlowGraph {
    let function = ast.function("f", Some(body));
    let program = program(ast, vec![ast.contract("C", &[], vec![function])]);
    let functions = program.source_unit().functions();
    program.control_flow_graph(functions[0]).unwrap()
}

fn branches(cfg: &ControlFlowGraph, id: &str, branch: Branch) -> usize {
    cfg.edges_out(id)
        .unwrap()
        .into_iter()
        .filter(|edge| edge.annotation() == Some(branch))
        .count()
}

#[test]
fn linear_function() {
    let ast = AstBuilder::new();
    let body = ast.block(vec![
        ast.declare("a", Some(ast.number(1))),
        ast.expr(ast.assign(ast.identifier("b"), ast.identifier("a"))),
    ]);
    let block = format!("{}_block", id(&body));
    let cfg = single_function(&ast, body);

    let kinds: Vec<NodeKind> = cfg.nodes().iter().map(|node| node.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            NodeKind::FunctionEntry,
            NodeKind::FunctionExit,
            NodeKind::BasicBlock
        ]
    );
    assert!(cfg
        .graph()
        .has_edge(cfg.entry(), cfg.index_of(&block).unwrap()));
    assert!(cfg.graph().has_edge(cfg.index_of(&block).unwrap(), cfg.exit()));
}

#[test]
fn if_else_converges() {
    let ast = AstBuilder::new();
    let if_statement = ast.if_(
        ast.identifier("c"),
        ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(1)))]),
        Some(ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(2)))])),
    );
    let if_id = id(&if_statement);
    let cfg = single_function(&ast, ast.block(vec![if_statement]));

    let condition = format!("{}_if", if_id);
    assert_eq!(branches(&cfg, &condition, Branch::True), 1);
    assert_eq!(branches(&cfg, &condition, Branch::False), 1);

    let convergence = format!("{}_convergent", if_id);
    assert_eq!(cfg.edges_in(&convergence).unwrap().len(), 2);
    assert!(cfg
        .graph()
        .has_edge(cfg.index_of(&convergence).unwrap(), cfg.exit()));
}

#[test]
fn loop_back_edges() {
    let ast = AstBuilder::new();
    let while_statement = ast.while_(
        ast.binary("<", ast.identifier("i"), ast.identifier("n")),
        ast.block(vec![ast.expr(ast.unary("++", ast.identifier("i")))]),
    );
    let while_id = id(&while_statement);
    let for_statement = ast.for_(
        Some(ast.declare("j", Some(ast.number(0)))),
        Some(ast.binary("<", ast.identifier("j"), ast.identifier("n"))),
        Some(ast.expr(ast.unary("++", ast.identifier("j")))),
        ast.block(vec![ast.expr(ast.assign_op(
            "+=",
            ast.identifier("total"),
            ast.identifier("j"),
        ))]),
    );
    let for_id = id(&for_statement);
    let cfg = single_function(&ast, ast.block(vec![while_statement, for_statement]));

    let edge = |from: String, to: String| {
        cfg.graph()
            .has_edge(cfg.index_of(&from).unwrap(), cfg.index_of(&to).unwrap())
    };

    assert!(edge(
        format!("{}_body", while_id),
        format!("{}_condition", while_id)
    ));
    assert!(edge(
        format!("{}_after", while_id),
        format!("{}_init", for_id)
    ));
    assert!(edge(
        format!("{}_body", for_id),
        format!("{}_increment", for_id)
    ));
    assert!(edge(
        format!("{}_increment", for_id),
        format!("{}_condition", for_id)
    ));
    assert_eq!(
        branches(&cfg, &format!("{}_condition", for_id), Branch::False),
        1
    );
    assert!(cfg.has_loops());
    assert!(cfg.unreachable_nodes().unwrap().is_empty());
}

#[test]
fn short_circuit_and() {
    // if (a && b) { x = 1; } else { x = 2; }
    let ast = AstBuilder::new();
    let condition = ast.binary("&&", ast.identifier("a"), ast.identifier("b"));
    let condition_id = id(&condition);
    let if_statement = ast.if_(
        condition,
        ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(1)))]),
        Some(ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(2)))])),
    );
    let if_id = id(&if_statement);
    let cfg = single_function(&ast, ast.block(vec![if_statement]));

    let left = format!("{}_left", condition_id);
    let right = format!("{}_right", condition_id);
    let bypass = format!("{}_bypass", condition_id);
    let join = format!("{}_if", if_id);

    let targets = |id: &str| -> Vec<(String, Option<Branch>)> {
        cfg.edges_out(id)
            .unwrap()
            .into_iter()
            .map(|edge| {
                let tail = cfg.node_at(edge.tail()).unwrap().id().to_string();
                (tail, edge.annotation())
            })
            .collect()
    };

    let out = targets(&left);
    assert!(out.contains(&(bypass.clone(), Some(Branch::False))));
    assert!(out.contains(&(right.clone(), Some(Branch::True))));

    let sources: Vec<String> = cfg
        .predecessors(&join)
        .unwrap()
        .into_iter()
        .map(|node| node.id().to_string())
        .collect();
    assert_eq!(sources, vec![bypass, right]);
    assert_eq!(cfg.node(&join).unwrap().kind(), NodeKind::BranchCondition);

    // The combined result branches once each way, and both arms converge.
    assert_eq!(
        targets(&join),
        vec![
            (format!("{}_true", if_id), Some(Branch::True)),
            (format!("{}_false", if_id), Some(Branch::False)),
        ]
    );
    let convergence = format!("{}_convergent", if_id);
    assert_eq!(cfg.edges_in(&convergence).unwrap().len(), 2);
}

#[test]
fn parenthesized_short_circuit() {
    // if ((a && b) || c) { x = 1; }
    let ast = AstBuilder::new();
    let inner = ast.binary("&&", ast.identifier("a"), ast.identifier("b"));
    let inner_id = id(&inner);
    let outer = ast.binary("||", ast.parenthesized(inner), ast.identifier("c"));
    let outer_id = id(&outer);
    let if_statement = ast.if_(
        ast.parenthesized(outer),
        ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(1)))]),
        None,
    );
    let if_id = id(&if_statement);
    let cfg = single_function(&ast, ast.block(vec![if_statement]));

    assert!(cfg.contains(&format!("{}_left", inner_id)));
    assert!(cfg.contains(&format!("{}_right", inner_id)));
    let inner_join = format!("{}_convergent", inner_id);
    assert_eq!(
        cfg.node(&inner_join).unwrap().kind(),
        NodeKind::Convergence
    );
    let successors: Vec<String> = cfg
        .successors(&inner_join)
        .unwrap()
        .into_iter()
        .map(|node| node.id().to_string())
        .collect();
    assert_eq!(
        successors,
        vec![
            format!("{}_bypass", outer_id),
            format!("{}_right", outer_id)
        ]
    );
    assert!(!cfg.contains(&format!("{}_left", outer_id)));
    assert_eq!(cfg.edges_in(&format!("{}_if", if_id)).unwrap().len(), 2);
}

#[test]
fn reaching_definitions_are_a_fixed_point() {
    let ast = AstBuilder::new();
    let body = ast.block(vec![
        ast.declare("x", Some(ast.number(0))),
        ast.while_(
            ast.binary("<", ast.identifier("x"), ast.identifier("n")),
            ast.block(vec![ast.expr(ast.assign_op(
                "+=",
                ast.identifier("x"),
                ast.number(1),
            ))]),
        ),
        ast.ret(Some(ast.identifier("x"))),
    ]);
    let cfg = single_function(&ast, body);

    let facts = analysis::reaching_definitions(&cfg).unwrap();
    assert!(fixed_point::is_fixed_point(&ReachingDefinitions, &cfg, &facts).unwrap());

    let again = fixed_point::fixed_point(&ReachingDefinitions, &cfg, SolverStrategy::RoundRobin)
        .unwrap();
    assert_eq!(facts.in_facts(), again.in_facts());
    assert_eq!(facts.out_facts(), again.out_facts());

    // The entry sees nothing, and the exit sees both definitions of x.
    let entry = cfg.entry_node().unwrap().id();
    assert!(facts.in_state(entry).is_empty());
    let exit = cfg.exit_node().unwrap().id();
    assert_eq!(facts.in_state(exit).len(), 2);
}

#[test]
fn unknown_node_has_no_facts() {
    let ast = AstBuilder::new();
    let cfg = single_function(&ast, ast.block(vec![]));
    assert!(analysis::reaching_definitions(&cfg)
        .unwrap()
        .in_state("no_such_node")
        .is_empty());
    assert!(analysis::live_variables(&cfg)
        .unwrap()
        .out_state("no_such_node")
        .is_empty());
}

#[test]
fn inherited_call_resolution() {
    // contract B { function foo() {} }
    // contract C is B { function caller() { foo(); } }
    let ast = AstBuilder::new();
    let b = ast.contract(
        "B",
        &[],
        vec![ast.function("foo", Some(ast.block(vec![])))],
    );
    let caller = ast.function(
        "caller",
        Some(ast.block(vec![ast.expr(ast.call("foo", vec![]))])),
    );
    let c = ast.contract("C", &["B"], vec![caller]);
    let program = program(&ast, vec![b, c]);

    let cha = program.call_graph(Algorithm::ClassHierarchy);
    assert!(cha.contains_edge("C.caller", "B.foo"));

    let rta = program.call_graph(Algorithm::RapidType);
    assert!(rta.callees("C.caller").unwrap().is_empty());
    assert!(rta.is_subgraph_of(&cha));
}

#[test]
fn rapid_type_is_subgraph() {
    let ast = AstBuilder::new();
    let a = ast.contract(
        "A",
        &[],
        vec![ast.function("run", Some(ast.block(vec![])))],
    );
    let b = ast.contract(
        "B",
        &["A"],
        vec![ast.function("run", Some(ast.block(vec![])))],
    );
    let factory = ast.function(
        "make",
        Some(ast.block(vec![
            ast.expr(ast.call_value(ast.new_("B"))),
            ast.expr(ast.call("run", vec![])),
        ])),
    );
    let program = program(&ast, vec![a, b, ast.contract("F", &[], vec![factory])]);

    let cha = program.call_graph(Algorithm::ClassHierarchy);
    let rta = program.call_graph(Algorithm::RapidType);
    assert!(cha.contains_edge("F.make", "A.run"));
    assert!(cha.contains_edge("F.make", "B.run"));
    assert!(!rta.contains_edge("F.make", "A.run"));
    assert!(rta.contains_edge("F.make", "B.run"));
    assert!(rta.is_subgraph_of(&cha));
    assert!(!cha.is_subgraph_of(&rta));
}

#[test]
fn malformed_body_keeps_function() {
    // contract B { function foo() { if <no condition> {} } }
    // contract C is B { function caller() { foo(); } }
    let ast = AstBuilder::new();
    let mut broken = ast.if_(ast.identifier("c"), ast.block(vec![]), None);
    broken.as_object_mut().unwrap().remove("condition");
    let foo = ast.function("foo", Some(ast.block(vec![broken])));
    let foo_id = id(&foo);
    let b = ast.contract("B", &[], vec![foo]);
    let caller = ast.function(
        "caller",
        Some(ast.block(vec![ast.expr(ast.call("foo", vec![]))])),
    );
    let c = ast.contract("C", &["B"], vec![caller]);
    let program = program(&ast, vec![b, c]);

    assert_eq!(program.failures().len(), 1);
    assert_eq!(program.failures()[0].function(), "foo");
    match *program.failures()[0].error() {
        Error::MissingField { ref kind, field, .. } => {
            assert_eq!(kind, "IfStatement");
            assert_eq!(field, "condition");
        }
        ref error => panic!("unexpected {:?}", error),
    }

    assert!(program.class_hierarchy().declares("B", "foo"));
    let cha = program.call_graph(Algorithm::ClassHierarchy);
    assert!(cha.contains_edge("C.caller", "B.foo"));
    assert!(cha.callees("B.foo").unwrap().is_empty());

    // Only the graph of foo is unavailable.
    let functions = program.source_unit().functions();
    let foo = functions.iter().find(|function| function.id() == foo_id).unwrap();
    match program.control_flow_graph(*foo) {
        Err(Error::MalformedBody { function, id }) => {
            assert_eq!(function, "foo");
            assert_eq!(id, foo_id);
        }
        result => panic!("unexpected {:?}", result.map(|cfg| cfg.to_string())),
    }

    let report = analysis::analyze(&program, &OptionsBuilder::new().build()).unwrap();
    assert!(report.function("C.caller").is_some());
    assert!(report.function("B.foo").is_none());
    assert_eq!(report.failures().len(), 1);
}

#[test]
fn malformed_modifier() {
    let ast = AstBuilder::new();
    let mut broken = ast.if_(ast.identifier("c"), ast.block(vec![]), None);
    broken.as_object_mut().unwrap().remove("condition");
    let modifier = ast.modifier("onlyOwner", ast.block(vec![broken]));
    let good = ast.function(
        "good",
        Some(ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(1)))])),
    );
    let value = ast.source_unit(vec![ast.contract("C", &[], vec![modifier, good])]);

    assert!(Program::from_json_strict(&value, "").is_err());

    let program = Program::from_json(&value, "").unwrap();
    assert_eq!(program.failures().len(), 1);
    assert_eq!(program.failures()[0].contract(), Some("C"));
    assert_eq!(program.failures()[0].function(), "onlyOwner");

    let contract = program.source_unit().contract("C").unwrap();
    assert_eq!(contract.nodes.len(), 1);

    let report = analysis::analyze(&program, &OptionsBuilder::new().build()).unwrap();
    assert!(report.function("C.good").is_some());
    assert_eq!(report.failures().len(), 1);
}

#[test]
fn invalid_algorithm() {
    match OptionsBuilder::new().algorithm_name("XTA") {
        Err(Error::InvalidAlgorithm(name)) => assert_eq!(name, "XTA"),
        result => panic!("unexpected {:?}", result.map(|builder| builder.build())),
    }
}

/// One function which converts, one which cannot be converted, and one
/// whose graph cannot be built.
fn partially_broken(ast: &AstBuilder) -> Value {
    let good = ast.function(
        "good",
        Some(ast.block(vec![ast.expr(ast.assign(ast.identifier("x"), ast.number(1)))])),
    );
    let mut broken = ast.function(
        "broken",
        Some(ast.block(vec![ast.expr(ast.identifier("x"))])),
    );
    broken["body"]["statements"][0]["expression"]["nodeType"] = Value::from("YulBlock");
    let assembly = ast.function("assembly", Some(ast.block(vec![ast.inline_assembly()])));
    ast.source_unit(vec![ast.contract("C", &[], vec![good, broken, assembly])])
}

#[test]
fn partial_failure() {
    let ast = AstBuilder::new();
    let program = Program::from_json(&partially_broken(&ast), "").unwrap();
    assert_eq!(program.failures().len(), 1);
    assert_eq!(program.failures()[0].function(), "broken");
    let contract = program.source_unit().contract("C").unwrap();
    assert_eq!(contract.functions().count(), 3);

    let (graphs, failures) = program.control_flow_graphs();
    assert_eq!(graphs.len(), 1);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].function(), "assembly");

    let report = analysis::analyze(&program, &OptionsBuilder::new().build()).unwrap();
    assert_eq!(report.functions().len(), 1);
    assert!(report.function("C.good").is_some());
    let failed: Vec<&str> = report
        .failures()
        .iter()
        .map(|failure| failure.function())
        .collect();
    assert_eq!(failed, vec!["broken", "assembly"]);
    match *report.failures()[1].error() {
        Error::UnsupportedConstruct { ref kind, .. } => assert_eq!(kind, "InlineAssembly"),
        ref error => panic!("unexpected {:?}", error),
    }
}

#[test]
fn fail_fast() {
    let ast = AstBuilder::new();
    let value = partially_broken(&ast);
    assert!(Program::from_json_strict(&value, "").is_err());

    let program = Program::from_json(&value, "").unwrap();
    let options = OptionsBuilder::new().fail_fast(true).build();
    assert!(analysis::analyze(&program, &options).is_err());
}

#[test]
fn report_serializes() {
    let ast = AstBuilder::new();
    let program = program(
        &ast,
        vec![ast.contract(
            "C",
            &[],
            vec![ast.function("f", Some(ast.block(vec![])))],
        )],
    );
    let report = analysis::analyze(&program, &OptionsBuilder::new().build()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["call_graph"]["edges"]["C.f"].is_array());
    assert_eq!(json["functions"].as_array().unwrap().len(), 1);
}
