//! Conversion from solc's compact JSON AST into the typed model.

use log::{debug, warn};
use serde_json::Value;

use crate::ast::*;
use crate::{Error, Failure};

/// Accessors over the fields of one JSON AST node, producing errors which
/// name the node's kind and id.
struct Fields<'v> {
    value: &'v Value,
    kind: &'v str,
    id: u64,
}

impl<'v> Fields<'v> {
    fn new(value: &'v Value) -> Result<Fields<'v>, Error> {
        let id = match value["id"] {
            Value::Number(ref id) => id.as_u64(),
            _ => None,
        };
        let kind = match value["nodeType"] {
            Value::String(ref kind) => kind.as_str(),
            _ => {
                return Err(Error::MissingField {
                    kind: "<unknown>".to_string(),
                    id: id.unwrap_or_default(),
                    field: "nodeType",
                })
            }
        };
        let id = id.ok_or_else(|| Error::MissingField {
            kind: kind.to_string(),
            id: 0,
            field: "id",
        })?;

        Ok(Fields { value, kind, id })
    }

    fn missing(&self, field: &'static str) -> Error {
        Error::MissingField {
            kind: self.kind.to_string(),
            id: self.id,
            field,
        }
    }

    fn invalid(&self, field: &'static str) -> Error {
        Error::InvalidField {
            kind: self.kind.to_string(),
            id: self.id,
            field,
        }
    }

    fn src(&self) -> Result<Span, Error> {
        self.string("src")?.parse()
    }

    /// A field which must be present and not null.
    fn field(&self, name: &'static str) -> Result<&'v Value, Error> {
        self.optional(name).ok_or_else(|| self.missing(name))
    }

    fn optional(&self, name: &'static str) -> Option<&'v Value> {
        match self.value.get(name) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    fn string(&self, name: &'static str) -> Result<String, Error> {
        match *self.field(name)? {
            Value::String(ref s) => Ok(s.to_string()),
            _ => Err(self.invalid(name)),
        }
    }

    fn optional_string(&self, name: &'static str) -> Result<Option<String>, Error> {
        match self.optional(name) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.to_string())),
            Some(_) => Err(self.invalid(name)),
        }
    }

    fn flag(&self, name: &'static str) -> bool {
        self.value[name].as_bool().unwrap_or(false)
    }

    fn array(&self, name: &'static str) -> Result<&'v [Value], Error> {
        match *self.field(name)? {
            Value::Array(ref values) => Ok(values.as_slice()),
            _ => Err(self.invalid(name)),
        }
    }
}

/// Converts JSON AST nodes, collecting the function definitions which fail
/// to convert.
pub(crate) struct Converter {
    strict: bool,
    contract: Option<String>,
    failures: Vec<Failure>,
}

impl Converter {
    /// When `strict`, the first failure of any kind is returned as an error.
    pub(crate) fn new(strict: bool) -> Converter {
        Converter {
            strict,
            contract: None,
            failures: Vec::new(),
        }
    }

    pub(crate) fn into_failures(self) -> Vec<Failure> {
        self.failures
    }

    /// Convert the members of a source unit or contract. A member which
    /// fails to convert is recorded and left out. A function keeps its
    /// header, so it still takes part in the class hierarchy and call graph.
    fn members(&mut self, values: &[Value]) -> Result<Vec<Node>, Error> {
        let mut nodes = Vec::with_capacity(values.len());
        for value in values {
            let error = match self.node(value) {
                Ok(node) => {
                    nodes.push(node);
                    continue;
                }
                Err(error) => error,
            };

            if self.strict {
                return Err(error);
            }

            let name = match value["name"].as_str() {
                Some(name) if !name.is_empty() => name,
                _ => value["kind"]
                    .as_str()
                    .or_else(|| value["nodeType"].as_str())
                    .unwrap_or("<unknown>"),
            };
            let failure = Failure::new(
                self.contract.clone(),
                name.to_string(),
                value["id"].as_u64().unwrap_or_default(),
                error,
            );
            warn!("{}", failure);
            self.failures.push(failure);

            if value["nodeType"].as_str() == Some("FunctionDefinition") {
                match self.malformed_function(value) {
                    Ok(node) => nodes.push(node),
                    Err(error) => debug!("Dropped function {}: {}", name, error),
                }
            }
        }
        Ok(nodes)
    }

    fn nodes(&mut self, values: &[Value]) -> Result<Vec<Node>, Error> {
        values.iter().map(|value| self.node(value)).collect()
    }

    /// Convert a list with gaps, such as tuple components.
    fn sparse_nodes(&mut self, values: &[Value]) -> Result<Vec<Option<Node>>, Error> {
        values
            .iter()
            .map(|value| match *value {
                Value::Null => Ok(None),
                ref value => self.node(value).map(Some),
            })
            .collect()
    }

    fn boxed(&mut self, value: &Value) -> Result<Box<Node>, Error> {
        Ok(Box::new(self.node(value)?))
    }

    fn optional_boxed(&mut self, value: Option<&Value>) -> Result<Option<Box<Node>>, Error> {
        value.map(|value| self.boxed(value)).transpose()
    }

    /// solc wraps parameters in a `ParameterList` node, which is flattened
    /// away.
    fn parameter_list(&mut self, value: &Value) -> Result<Vec<Node>, Error> {
        let list = Fields::new(value)?;
        let parameters = list.array("parameters")?;
        self.nodes(parameters)
    }

    fn base_contracts(fields: &Fields) -> Result<Vec<String>, Error> {
        let mut bases = Vec::new();
        for specifier in fields.array("baseContracts")? {
            let base_name = &specifier["baseName"];
            let name = base_name["name"]
                .as_str()
                .or_else(|| base_name["pathNode"]["name"].as_str())
                .ok_or_else(|| fields.invalid("baseContracts"))?;
            bases.push(name.to_string());
        }
        Ok(bases)
    }

    fn contract(&mut self, fields: &Fields) -> Result<ContractDefinition, Error> {
        let name = fields.string("name")?;
        let contract_kind = fields
            .optional_string("contractKind")?
            .unwrap_or_else(|| "contract".to_string());
        let base_contracts = Converter::base_contracts(fields)?;

        let members = fields.array("nodes")?;

        debug!("Converting contract {}", name);
        let enclosing = self.contract.replace(name.clone());
        let nodes = self.members(members);
        self.contract = enclosing;

        Ok(ContractDefinition {
            name,
            contract_kind,
            base_contracts,
            nodes: nodes?,
        })
    }

    /// Everything but the body of a function.
    fn function_header(&mut self, fields: &Fields) -> Result<FunctionDefinition, Error> {
        let kind = match fields.optional_string("kind")?.as_deref() {
            Some("function") => FunctionKind::Function,
            Some("constructor") => FunctionKind::Constructor,
            Some("fallback") => FunctionKind::Fallback,
            Some("receive") => FunctionKind::Receive,
            Some("freeFunction") => FunctionKind::FreeFunction,
            Some(_) => return Err(fields.invalid("kind")),
            None => {
                if fields.flag("isConstructor") {
                    FunctionKind::Constructor
                } else {
                    FunctionKind::Function
                }
            }
        };

        Ok(FunctionDefinition {
            name: fields.optional_string("name")?.unwrap_or_default(),
            kind,
            visibility: fields.optional_string("visibility")?,
            state_mutability: fields.optional_string("stateMutability")?,
            parameters: self.parameter_list(fields.field("parameters")?)?,
            return_parameters: match fields.optional("returnParameters") {
                Some(list) => self.parameter_list(list)?,
                None => Vec::new(),
            },
            body: None,
            malformed_body: false,
        })
    }

    fn function(&mut self, fields: &Fields) -> Result<FunctionDefinition, Error> {
        let mut function = self.function_header(fields)?;
        function.body = self.optional_boxed(fields.optional("body"))?;
        Ok(function)
    }

    /// The header of a function whose body failed to convert.
    fn malformed_function(&mut self, value: &Value) -> Result<Node, Error> {
        let fields = Fields::new(value)?;
        let mut function = self.function_header(&fields)?;
        function.malformed_body = true;
        Ok(Node::new(
            fields.id,
            fields.src()?,
            NodeKind::FunctionDefinition(function),
        ))
    }

    /// The name of a user defined type, which newer compilers move into a
    /// `pathNode`.
    fn type_name(fields: &Fields) -> Result<String, Error> {
        match fields.optional_string("name")? {
            Some(name) => Ok(name),
            None => fields.value["pathNode"]["name"]
                .as_str()
                .map(|name| name.to_string())
                .ok_or_else(|| fields.missing("name")),
        }
    }

    pub(crate) fn node(&mut self, value: &Value) -> Result<Node, Error> {
        let fields = Fields::new(value)?;
        let src = fields.src()?;

        let kind = match fields.kind {
            "SourceUnit" => NodeKind::SourceUnit {
                nodes: self.members(fields.array("nodes")?)?,
            },
            "PragmaDirective" => NodeKind::PragmaDirective {
                literals: fields
                    .array("literals")?
                    .iter()
                    .map(|literal| {
                        literal
                            .as_str()
                            .map(|literal| literal.to_string())
                            .ok_or_else(|| fields.invalid("literals"))
                    })
                    .collect::<Result<Vec<String>, Error>>()?,
            },
            "ImportDirective" => NodeKind::ImportDirective {
                file: fields.string("file")?,
            },
            "ContractDefinition" => NodeKind::ContractDefinition(self.contract(&fields)?),
            "FunctionDefinition" => NodeKind::FunctionDefinition(self.function(&fields)?),
            "ModifierDefinition" => NodeKind::ModifierDefinition {
                name: fields.string("name")?,
                parameters: self.parameter_list(fields.field("parameters")?)?,
                body: self.optional_boxed(fields.optional("body"))?,
            },
            "EventDefinition" => NodeKind::EventDefinition {
                name: fields.string("name")?,
                parameters: self.parameter_list(fields.field("parameters")?)?,
            },
            "ErrorDefinition" => NodeKind::ErrorDefinition {
                name: fields.string("name")?,
                parameters: self.parameter_list(fields.field("parameters")?)?,
            },
            "StructDefinition" => NodeKind::StructDefinition {
                name: fields.string("name")?,
                members: self.nodes(fields.array("members")?)?,
            },
            "EnumDefinition" => NodeKind::EnumDefinition {
                name: fields.string("name")?,
                members: fields
                    .array("members")?
                    .iter()
                    .map(|member| {
                        member["name"]
                            .as_str()
                            .map(|name| name.to_string())
                            .ok_or_else(|| fields.invalid("members"))
                    })
                    .collect::<Result<Vec<String>, Error>>()?,
            },
            "UserDefinedValueTypeDefinition" => NodeKind::UserDefinedValueTypeDefinition {
                name: fields.string("name")?,
            },
            "UsingForDirective" => NodeKind::UsingForDirective,
            "VariableDeclaration" => NodeKind::VariableDeclaration {
                name: fields.string("name")?,
                type_name: self.optional_boxed(fields.optional("typeName"))?,
                value: self.optional_boxed(fields.optional("value"))?,
                state_variable: fields.flag("stateVariable"),
            },

            "Block" => NodeKind::Block {
                statements: self.nodes(fields.array("statements")?)?,
            },
            "UncheckedBlock" => NodeKind::UncheckedBlock {
                statements: self.nodes(fields.array("statements")?)?,
            },
            "VariableDeclarationStatement" => NodeKind::VariableDeclarationStatement {
                declarations: self.sparse_nodes(fields.array("declarations")?)?,
                initial_value: self.optional_boxed(fields.optional("initialValue"))?,
            },
            "ExpressionStatement" => NodeKind::ExpressionStatement {
                expression: self.boxed(fields.field("expression")?)?,
            },
            "IfStatement" => NodeKind::IfStatement {
                condition: self.boxed(fields.field("condition")?)?,
                true_body: self.optional_boxed(fields.optional("trueBody"))?,
                false_body: self.optional_boxed(fields.optional("falseBody"))?,
            },
            "WhileStatement" => NodeKind::WhileStatement {
                condition: self.boxed(fields.field("condition")?)?,
                body: self.boxed(fields.field("body")?)?,
            },
            "DoWhileStatement" => NodeKind::DoWhileStatement {
                condition: self.boxed(fields.field("condition")?)?,
                body: self.boxed(fields.field("body")?)?,
            },
            "ForStatement" => NodeKind::ForStatement {
                initialization_expression: self
                    .optional_boxed(fields.optional("initializationExpression"))?,
                condition: self.optional_boxed(fields.optional("condition"))?,
                loop_expression: self.optional_boxed(fields.optional("loopExpression"))?,
                body: self.boxed(fields.field("body")?)?,
            },
            "Return" => NodeKind::Return {
                expression: self.optional_boxed(fields.optional("expression"))?,
            },
            "Break" => NodeKind::Break,
            "Continue" => NodeKind::Continue,
            "PlaceholderStatement" => NodeKind::PlaceholderStatement,
            "EmitStatement" => NodeKind::EmitStatement {
                event_call: self.boxed(fields.field("eventCall")?)?,
            },
            "RevertStatement" => NodeKind::RevertStatement {
                error_call: self.boxed(fields.field("errorCall")?)?,
            },
            "InlineAssembly" => NodeKind::InlineAssembly,
            "TryStatement" => NodeKind::TryStatement {
                external_call: self.boxed(fields.field("externalCall")?)?,
                clauses: self.nodes(fields.array("clauses")?)?,
            },
            "TryCatchClause" => NodeKind::TryCatchClause {
                error_name: fields.optional_string("errorName")?.unwrap_or_default(),
                parameters: match fields.optional("parameters") {
                    Some(list) => self.parameter_list(list)?,
                    None => Vec::new(),
                },
                block: self.boxed(fields.field("block")?)?,
            },

            "BinaryOperation" => NodeKind::BinaryOperation {
                operator: fields.string("operator")?,
                left_expression: self.boxed(fields.field("leftExpression")?)?,
                right_expression: self.boxed(fields.field("rightExpression")?)?,
            },
            "UnaryOperation" => NodeKind::UnaryOperation {
                operator: fields.string("operator")?,
                prefix: fields.flag("prefix"),
                sub_expression: self.boxed(fields.field("subExpression")?)?,
            },
            "Assignment" => NodeKind::Assignment {
                operator: fields.string("operator")?,
                left_hand_side: self.boxed(fields.field("leftHandSide")?)?,
                right_hand_side: self.boxed(fields.field("rightHandSide")?)?,
            },
            "Identifier" => NodeKind::Identifier {
                name: fields.string("name")?,
                referenced_declaration: fields
                    .optional("referencedDeclaration")
                    .and_then(|declaration| declaration.as_i64()),
            },
            "Literal" => NodeKind::Literal {
                kind: fields.string("kind")?,
                value: fields.optional_string("value")?,
            },
            "FunctionCall" => NodeKind::FunctionCall {
                expression: self.boxed(fields.field("expression")?)?,
                arguments: self.nodes(fields.array("arguments")?)?,
            },
            "FunctionCallOptions" => NodeKind::FunctionCallOptions {
                expression: self.boxed(fields.field("expression")?)?,
                options: self.nodes(fields.array("options")?)?,
            },
            "NewExpression" => NodeKind::NewExpression {
                type_name: self.boxed(fields.field("typeName")?)?,
            },
            "MemberAccess" => NodeKind::MemberAccess {
                expression: self.boxed(fields.field("expression")?)?,
                member_name: fields.string("memberName")?,
            },
            "IndexAccess" => NodeKind::IndexAccess {
                base_expression: self.boxed(fields.field("baseExpression")?)?,
                index_expression: self.optional_boxed(fields.optional("indexExpression"))?,
            },
            "IndexRangeAccess" => NodeKind::IndexRangeAccess {
                base_expression: self.boxed(fields.field("baseExpression")?)?,
                start_expression: self.optional_boxed(fields.optional("startExpression"))?,
                end_expression: self.optional_boxed(fields.optional("endExpression"))?,
            },
            "TupleExpression" => NodeKind::TupleExpression {
                components: self.sparse_nodes(fields.array("components")?)?,
                is_inline_array: fields.flag("isInlineArray"),
            },
            "Conditional" => NodeKind::Conditional {
                condition: self.boxed(fields.field("condition")?)?,
                true_expression: self.boxed(fields.field("trueExpression")?)?,
                false_expression: self.boxed(fields.field("falseExpression")?)?,
            },
            "ElementaryTypeNameExpression" => NodeKind::ElementaryTypeNameExpression {
                type_name: match *fields.field("typeName")? {
                    Value::String(ref name) => name.to_string(),
                    ref type_name => type_name["name"]
                        .as_str()
                        .map(|name| name.to_string())
                        .ok_or_else(|| fields.invalid("typeName"))?,
                },
            },

            "ElementaryTypeName" => NodeKind::ElementaryTypeName {
                name: fields.string("name")?,
            },
            "UserDefinedTypeName" => NodeKind::UserDefinedTypeName {
                name: Converter::type_name(&fields)?,
            },
            "Mapping" => NodeKind::Mapping {
                key_type: self.boxed(fields.field("keyType")?)?,
                value_type: self.boxed(fields.field("valueType")?)?,
            },
            "ArrayTypeName" => NodeKind::ArrayTypeName {
                base_type: self.boxed(fields.field("baseType")?)?,
                length: self.optional_boxed(fields.optional("length"))?,
            },
            "FunctionTypeName" => NodeKind::FunctionTypeName,

            kind => {
                return Err(Error::UnknownNodeType {
                    kind: kind.to_string(),
                    id: fields.id,
                })
            }
        };

        Ok(Node::new(fields.id, src, kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn convert_expression() {
        let value = json!({
            "nodeType": "BinaryOperation",
            "id": 3,
            "src": "0:5:0",
            "operator": "+",
            "leftExpression": {
                "nodeType": "Identifier", "id": 1, "src": "0:1:0",
                "name": "a", "referencedDeclaration": 10
            },
            "rightExpression": {
                "nodeType": "Literal", "id": 2, "src": "4:1:0",
                "kind": "number", "value": "1"
            }
        });

        let node = Converter::new(true).node(&value).unwrap();
        assert_eq!(node.id(), 3);
        assert_eq!(node.node_type(), "BinaryOperation");
        assert_eq!(node.text("a + 1"), "a + 1");

        let children = node.children();
        assert_eq!(children.len(), 2);
        assert_eq!(
            *children[0].kind(),
            NodeKind::Identifier {
                name: "a".to_string(),
                referenced_declaration: Some(10)
            }
        );
    }

    #[test]
    fn unknown_node_type() {
        let value = json!({"nodeType": "YulBlock", "id": 7, "src": "0:0:0"});
        match Converter::new(true).node(&value) {
            Err(Error::UnknownNodeType { kind, id }) => {
                assert_eq!(kind, "YulBlock");
                assert_eq!(id, 7);
            }
            result => panic!("unexpected {:?}", result),
        }
    }

    #[test]
    fn missing_required_field() {
        let value = json!({
            "nodeType": "IfStatement", "id": 4, "src": "0:0:0",
            "trueBody": {"nodeType": "Block", "id": 5, "src": "0:0:0", "statements": []}
        });
        match Converter::new(true).node(&value) {
            Err(Error::MissingField { kind, id, field }) => {
                assert_eq!(kind, "IfStatement");
                assert_eq!(id, 4);
                assert_eq!(field, "condition");
            }
            result => panic!("unexpected {:?}", result),
        }
    }

    #[test]
    fn base_contracts_in_declaration_order() {
        let value = json!({
            "nodeType": "ContractDefinition", "id": 1, "src": "0:0:0",
            "name": "C", "contractKind": "contract",
            "baseContracts": [
                {"nodeType": "InheritanceSpecifier", "id": 2, "src": "0:0:0",
                 "baseName": {"nodeType": "IdentifierPath", "id": 3, "src": "0:0:0", "name": "B"}},
                {"nodeType": "InheritanceSpecifier", "id": 4, "src": "0:0:0",
                 "baseName": {"nodeType": "UserDefinedTypeName", "id": 5, "src": "0:0:0",
                              "pathNode": {"name": "A"}}},
                {"nodeType": "InheritanceSpecifier", "id": 6, "src": "0:0:0",
                 "baseName": {"nodeType": "IdentifierPath", "id": 7, "src": "0:0:0", "name": "B"}}
            ],
            "nodes": []
        });

        let node = Converter::new(true).node(&value).unwrap();
        let contract = node.as_contract().unwrap();
        assert_eq!(contract.base_contracts, vec!["B", "A", "B"]);
    }

    #[test]
    fn record_failed_function() {
        let value = json!({
            "nodeType": "SourceUnit", "id": 1, "src": "0:0:0",
            "nodes": [{
                "nodeType": "ContractDefinition", "id": 2, "src": "0:0:0",
                "name": "C", "contractKind": "contract", "baseContracts": [],
                "nodes": [{
                    "nodeType": "FunctionDefinition", "id": 3, "src": "0:0:0",
                    "name": "broken", "kind": "function",
                    "parameters": {
                        "nodeType": "ParameterList", "id": 4, "src": "0:0:0",
                        "parameters": []
                    },
                    "body": {"nodeType": "Block", "id": 5, "src": "0:0:0", "statements": [
                        {"nodeType": "IfStatement", "id": 6, "src": "0:0:0"}
                    ]}
                }]
            }]
        });

        let mut converter = Converter::new(false);
        let node = converter.node(&value).unwrap();
        let failures = converter.into_failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].contract(), Some("C"));
        assert_eq!(failures[0].function(), "broken");
        assert_eq!(failures[0].function_id(), 3);

        // The header survives, without a body.
        let contract = node.children()[0].as_contract().unwrap();
        assert_eq!(contract.nodes.len(), 1);
        let function = contract.nodes[0].as_function().unwrap();
        assert_eq!(function.name, "broken");
        assert!(function.malformed_body);
        assert!(function.body.is_none());

        assert!(Converter::new(true).node(&value).is_err());
    }
}
