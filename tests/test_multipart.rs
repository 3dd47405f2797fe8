use skiff::http::multipart::{boundary_from_content_type, decode_multipart};
use skiff::http::parser::{ParseError, ParseOptions, parse_http_request};

enum Part<'a> {
    Field(&'a str, &'a str),
    File(&'a str, &'a str, &'a str, &'a [u8]),
}

fn build_body(boundary: &str, parts: &[Part]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", boundary).as_bytes());
        match part {
            Part::Field(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name).as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, content_type, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", boundary).as_bytes());
    body
}

#[test]
fn test_fields_and_files_are_split() {
    let parts = [
        Part::Field("name", "bob"),
        Part::File("avatar", "a.png", "image/png", b"P"),
        Part::Field("age", "42"),
        Part::File("cv", "cv.pdf", "application/pdf", b"%PDF-1.4\r\n\x00\x01binary"),
    ];
    let body = build_body("XYZ", &parts);

    let form = decode_multipart(&body, "--XYZ").unwrap();

    assert_eq!(form.fields.len(), 2);
    assert_eq!(form.files.len(), 2);
    assert_eq!(form.fields.get("name"), Some(&Some("bob".to_string())));
    assert_eq!(form.fields.get("age"), Some(&Some("42".to_string())));

    let avatar = &form.files["avatar"];
    assert_eq!(avatar.field_name, "avatar");
    assert_eq!(avatar.filename, "a.png");
    assert_eq!(avatar.content_type, "image/png");
    assert_eq!(avatar.data, b"P".to_vec());

    let cv = &form.files["cv"];
    assert_eq!(cv.data, b"%PDF-1.4\r\n\x00\x01binary".to_vec());
}

#[test]
fn test_part_order_does_not_matter() {
    let forward = build_body(
        "b0",
        &[
            Part::File("f", "x.txt", "text/plain", b"hello"),
            Part::Field("k", "v"),
        ],
    );
    let backward = build_body(
        "b0",
        &[
            Part::Field("k", "v"),
            Part::File("f", "x.txt", "text/plain", b"hello"),
        ],
    );

    assert_eq!(
        decode_multipart(&forward, "--b0").unwrap(),
        decode_multipart(&backward, "--b0").unwrap()
    );
}

#[test]
fn test_field_value_is_trimmed() {
    let body = build_body("B", &[Part::Field("note", "  spaced out \n")]);
    let form = decode_multipart(&body, "--B").unwrap();

    assert_eq!(form.fields.get("note"), Some(&Some("spaced out".to_string())));
}

#[test]
fn test_repeated_field_last_wins() {
    let body = build_body("B", &[Part::Field("k", "first"), Part::Field("k", "second")]);
    let form = decode_multipart(&body, "--B").unwrap();

    assert_eq!(form.fields.get("k"), Some(&Some("second".to_string())));
}

#[test]
fn test_repeated_file_last_wins() {
    let body = build_body(
        "B",
        &[
            Part::File("doc", "one.txt", "text/plain", b"1"),
            Part::File("doc", "two.txt", "text/plain", b"2"),
        ],
    );
    let form = decode_multipart(&body, "--B").unwrap();

    assert_eq!(form.files.len(), 1);
    assert_eq!(form.files["doc"].filename, "two.txt");
}

#[test]
fn test_quoted_filename_with_semicolon() {
    let body = build_body(
        "B",
        &[
            Part::File("upload", "a; b.png", "image/png", b"P"),
            Part::Field("note", "x"),
        ],
    );
    let form = decode_multipart(&body, "--B").unwrap();

    assert_eq!(form.files["upload"].filename, "a; b.png");
    assert_eq!(form.files["upload"].content_type, "image/png");
    assert_eq!(form.fields.get("note"), Some(&Some("x".to_string())));
}

#[test]
fn test_file_without_content_type_defaults() {
    let body = b"--B\r\nContent-Disposition: form-data; name=\"f\"; filename=\"raw.bin\"\r\n\r\nxyz\r\n--B--\r\n";
    let form = decode_multipart(body, "--B").unwrap();

    assert_eq!(form.files["f"].content_type, "application/octet-stream");
    assert_eq!(form.files["f"].data, b"xyz".to_vec());
}

#[test]
fn test_part_without_name_is_malformed() {
    let body = b"--B\r\nContent-Disposition: form-data\r\n\r\nxyz\r\n--B--\r\n";
    let result = decode_multipart(body, "--B");

    assert!(matches!(result, Err(ParseError::MalformedMultipart(_))));
}

#[test]
fn test_boundary_extraction() {
    assert_eq!(
        boundary_from_content_type("multipart/form-data; boundary=XYZ").unwrap(),
        "--XYZ"
    );
    assert_eq!(
        boundary_from_content_type("multipart/form-data;boundary=abc; charset=utf-8").unwrap(),
        "--abc"
    );
    assert!(boundary_from_content_type("multipart/form-data; charset=utf-8").is_err());
}

#[test]
fn test_multipart_request_end_to_end() {
    let body = build_body(
        "XYZ",
        &[
            Part::Field("name", "bob"),
            Part::File("avatar", "a.png", "image/png", b"P"),
        ],
    );
    let mut req = format!(
        "POST /profile HTTP/1.1\r\nContent-Type: multipart/form-data; boundary=XYZ\r\nContent-Length: {}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    req.extend_from_slice(&body);

    let (parsed, consumed) = parse_http_request(&req, &ParseOptions::default()).unwrap();

    assert_eq!(consumed, req.len());
    assert_eq!(parsed.attributes().len(), 1);
    assert_eq!(parsed.attribute("name"), Some("bob"));

    let files = parsed.files().unwrap();
    assert_eq!(files.len(), 1);
    let avatar = &files["avatar"];
    assert_eq!(
        (avatar.filename.as_str(), avatar.content_type.as_str(), avatar.data.as_slice()),
        ("a.png", "image/png", b"P".as_slice())
    );
}
