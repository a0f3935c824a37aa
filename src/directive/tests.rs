#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::*;
use http::Method;

fn lines(src: &[&str]) -> Vec<String> {
    src.iter().map(|s| s.to_string()).collect()
}

#[test]
fn test_parse_directive_line() {
    let d = Directive::parse(" @gtg method GET", MARKER).unwrap();
    assert_eq!(d.keyword, "method");
    assert_eq!(d.argument, "GET");
    assert_eq!(d.scope, Scope::Request);

    let d = Directive::parse("@gtg response-status 201", MARKER).unwrap();
    assert_eq!(d.scope, Scope::Response);

    let d = Directive::parse("@gtg summary Fetch one item", MARKER).unwrap();
    assert_eq!(d.scope, Scope::Document);
    assert_eq!(d.argument, "Fetch one item");
}

#[test]
fn test_parse_directive_ignores_unmarked_lines() {
    assert!(Directive::parse("Fetches an item by id.", MARKER).is_none());
    assert!(Directive::parse("@gtgmethod GET", MARKER).is_none());
    assert!(Directive::parse("@gtg", MARKER).is_none());
    assert!(Directive::parse("see @gtg method GET", MARKER).is_none());
}

#[test]
fn test_family_prefix_is_stripped() {
    let d = Directive::parse("@gtg http-server-uri-path /items", MARKER).unwrap();
    assert_eq!(d.keyword, "uri-path");
    let d = Directive::parse("@gtg swagger-title Items API", MARKER).unwrap();
    assert_eq!(d.keyword, "title");
    assert_eq!(d.scope, Scope::Document);
}

#[test]
fn test_method_chain_example_scenario() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&[
                "Fetches one item.",
                " @gtg method GET",
                " @gtg uri-path /items/{id}",
                " @gtg response-status 200",
            ]),
            MARKER,
        )
        .unwrap();
    assert_eq!(out.verb, Some(Method::GET));
    assert_eq!(out.uri_path.as_deref(), Some("/items/{id}"));
    assert_eq!(out.response_status, Some(200));
}

#[test]
fn test_unknown_keyword_is_dropped() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&["@gtg teleport now", "@gtg method put", "@gtg rate-limit 10/s"]),
            MARKER,
        )
        .unwrap();
    let expected = MethodDirectives {
        verb: Some(Method::PUT),
        ..Default::default()
    };
    assert_eq!(out, expected);
}

#[test]
fn test_unknown_verb_is_syntax_error() {
    let chain = DirectiveChain::method_chain();
    let err = chain
        .parse(&lines(&["@gtg method FETCH"]), MARKER)
        .unwrap_err();
    assert!(err.message.contains("FETCH"));
    assert_eq!(err.line, "@gtg method FETCH");
}

#[test]
fn test_headers_accumulate_and_status_keeps_last() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&[
                "@gtg header X-Request-Id: {request_id}",
                "@gtg header Authorization: token",
                "@gtg response-status 200",
                "@gtg response-status 202",
                "@gtg content-type text/plain",
                "@gtg content-type application/json",
            ]),
            MARKER,
        )
        .unwrap();
    assert_eq!(
        out.headers,
        vec![
            HeaderDirective {
                name: "X-Request-Id".into(),
                param: "request_id".into()
            },
            HeaderDirective {
                name: "Authorization".into(),
                param: "token".into()
            },
        ]
    );
    assert_eq!(out.response_status, Some(202));
    assert_eq!(out.content_type.as_deref(), Some("application/json"));
}

#[test]
fn test_query_with_key_override() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(&lines(&["@gtg query limit, page_token=pageToken"]), MARKER)
        .unwrap();
    assert_eq!(
        out.queries,
        vec![
            QueryDirective {
                param: "limit".into(),
                key: "limit".into()
            },
            QueryDirective {
                param: "page_token".into(),
                key: "pageToken".into()
            },
        ]
    );
}

#[test]
fn test_errors_directive() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&["@gtg errors NotFound=404, ItemError::Conflict=409"]),
            MARKER,
        )
        .unwrap();
    assert_eq!(out.errors.get("NotFound"), Some(&404));
    assert_eq!(out.errors.get("ItemError::Conflict"), Some(&409));
}

#[test]
fn test_errors_with_unparsable_code_fail() {
    let chain = DirectiveChain::method_chain();
    let err = chain
        .parse(&lines(&["@gtg errors NotFound=four-oh-four"]), MARKER)
        .unwrap_err();
    assert!(err.message.contains("four-oh-four"), "{}", err.message);

    let err = chain
        .parse(&lines(&["@gtg errors NotFound=999"]), MARKER)
        .unwrap_err();
    assert!(err.message.contains("999"));
}

#[test]
fn test_non_numeric_status_fails() {
    let chain = DirectiveChain::method_chain();
    assert!(chain
        .parse(&lines(&["@gtg response-status OK"]), MARKER)
        .is_err());
}

#[test]
fn test_response_directives() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&[
                "@gtg response-header X-Total: {total}",
                "@gtg response-header Cache-Control: no-store",
                "@gtg response-content-type application/octet-stream",
                "@gtg response-content-encoding GZIP",
                "@gtg response-json-tag total_count=totalCount",
                "@gtg response-body items",
            ]),
            MARKER,
        )
        .unwrap();
    assert_eq!(
        out.response_headers[0].value,
        HeaderValue::Field("total".into())
    );
    assert_eq!(
        out.response_headers[1].value,
        HeaderValue::Literal("no-store".into())
    );
    assert_eq!(out.response_content_encoding.as_deref(), Some("gzip"));
    assert_eq!(
        out.response_json_tags.get("total_count").map(String::as_str),
        Some("totalCount")
    );
    assert_eq!(out.response_body, Some(ResponseBody::Field("items".into())));
}

#[test]
fn test_json_tag_both_spellings() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&["@gtg json-tag display_name displayName", "@gtg json-tag age=years"]),
            MARKER,
        )
        .unwrap();
    assert_eq!(out.json_tags.len(), 2);
    assert_eq!(out.json_tags["display_name"], "displayName");
    assert_eq!(out.json_tags["age"], "years");
}

#[test]
fn test_path_variables_in_order() {
    assert_eq!(
        path_variables("/users/{user_id}/posts/{post_id}").unwrap(),
        vec!["user_id".to_string(), "post_id".to_string()]
    );
    assert!(path_variables("/plain").unwrap().is_empty());
}

#[test]
fn test_route_shape_erases_variable_names() {
    assert_eq!(route_shape("/users/{user_id}/posts/{id}"), "/users/{}/posts/{}");
    assert_eq!(route_shape("/users/{uid}/posts/{post}"), route_shape("/users/{a}/posts/{b}"));
    assert_eq!(route_shape("/plain"), "/plain");
}

#[test]
fn test_server_url_keeps_query_string() {
    let server = parse_server("https://api.example.com/v1?tenant=a = production").unwrap();
    assert_eq!(server.url, "https://api.example.com/v1?tenant=a");
    assert_eq!(server.description, "production");

    let bare = parse_server("https://h/v1?tenant=a").unwrap();
    assert_eq!(bare.url, "https://h/v1?tenant=a");
    assert_eq!(bare.description, "");

    let spaced = parse_server("https://h = primary = eu").unwrap();
    assert_eq!(spaced.url, "https://h");
    assert_eq!(spaced.description, "primary = eu");
    assert!(parse_server(" = nothing").is_err());
}

#[test]
fn test_path_variables_malformed() {
    assert!(path_variables("items/{id}").is_err());
    assert!(path_variables("/items/{id").is_err());
    assert!(path_variables("/items/id}").is_err());
    assert!(path_variables("/items/{}").is_err());
    assert!(path_variables("/items/{a{b}}").is_err());
    assert!(path_variables("/items/{not-ident}").is_err());
}

#[test]
fn test_method_level_document_directives() {
    let chain = DirectiveChain::method_chain();
    let out = chain
        .parse(
            &lines(&[
                "@gtg summary Get item",
                "@gtg description Returns the item with the given id.",
                "@gtg title Items API",
                "@gtg servers https://api.example.com = production",
            ]),
            MARKER,
        )
        .unwrap();
    assert_eq!(out.summary.as_deref(), Some("Get item"));
    assert_eq!(
        out.description.as_deref(),
        Some("Returns the item with the given id.")
    );
    assert_eq!(out.document.title.as_deref(), Some("Items API"));
    assert_eq!(out.document.servers[0].url, "https://api.example.com");
    assert_eq!(out.document.servers[0].description, "production");
}

#[test]
fn test_document_chain_and_merge() {
    let chain = DirectiveChain::document_chain();
    let mut base = chain
        .parse(
            &lines(&[
                "@gtg http-server http-client",
                "@gtg title First",
                "@gtg version 1.0.0",
                "@gtg servers http://a = A",
            ]),
            MARKER,
        )
        .unwrap();
    let later = chain
        .parse(
            &lines(&["@gtg title Second", "@gtg servers http://a = renamed"]),
            MARKER,
        )
        .unwrap();
    base.merge(&later);
    assert_eq!(base.title.as_deref(), Some("Second"));
    assert_eq!(base.version.as_deref(), Some("1.0.0"));
    assert_eq!(base.servers.len(), 1);
    assert_eq!(base.servers[0].description, "renamed");
}

#[test]
fn test_empty_argument_is_rejected() {
    let chain = DirectiveChain::method_chain();
    assert!(chain.parse(&lines(&["@gtg uri-path"]), MARKER).is_err());
}

#[test]
fn test_marked_words_and_is_marked() {
    assert_eq!(
        marked_words("  @gtg http-server log", MARKER),
        Some(vec!["http-server", "log"])
    );
    assert!(marked_words("nothing here", MARKER).is_none());
    assert!(is_marked(&lines(&[" @gtg method GET", "doc"]), MARKER));
    assert!(is_marked(&lines(&["", " @gtg method GET"]), MARKER));
    assert!(!is_marked(&lines(&["doc", " @gtg method GET"]), MARKER));
    assert!(!is_marked(&lines(&["doc"]), MARKER));
    assert!(!is_marked(&[], MARKER));
}
