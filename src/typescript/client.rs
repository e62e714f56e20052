use crate::config::GeneratorConfig;
use crate::extractor::{BodyKind, ResponseKind};
use crate::typescript::bindings::{
    BindingPlan, MethodBinding, ModuleBindings, QueryBinding, TYPES_NAMESPACE,
};
use crate::typescript::mapping::{property_key, string_literal};
use crate::typescript::GENERATED_HEADER;

const TRANSPORT: &str = r#"export type HttpMethod = 'GET' | 'POST' | 'PUT' | 'PATCH' | 'DELETE' | 'HEAD' | 'OPTIONS';

export type ResponseKind = 'json' | 'blob' | 'text' | 'formData';

export interface HttpRequest {
  method: HttpMethod;
  url: string;
  query?: object;
  json?: unknown;
  form?: unknown;
  formData?: FormData;
  binary?: Blob | ArrayBuffer;
  auth?: boolean;
  responseType: ResponseKind;
}

export interface HttpResponse<T> {
  status: number;
  ok: boolean;
  data: T;
  headers: Headers;
}

/** Performs requests for the generated API classes. */
export interface HttpTransport {
  request<T>(request: HttpRequest): Promise<HttpResponse<T>>;
}
"#;

/// Renders the client file: transport contracts, one class per module and a root client.
pub fn render_client(plan: &BindingPlan, config: &GeneratorConfig) -> String {
    let mut out = String::new();
    out.push_str(GENERATED_HEADER);
    out.push_str(&format!("import type * as {} from './{}';\n", TYPES_NAMESPACE, types_module(config)));
    out.push_str(&format!("import type {{ QueryInput }} from './{}';\n", types_module(config)));
    out.push('\n');
    out.push_str(TRANSPORT);

    for module in &plan.modules {
        out.push('\n');
        render_module(&mut out, module, &config.api_prefix);
    }

    out.push('\n');
    render_root(&mut out, plan);
    out
}

fn types_module(config: &GeneratorConfig) -> &str {
    config
        .types_file
        .strip_suffix(".ts")
        .unwrap_or(&config.types_file)
}

pub fn class_name(module: &str) -> String {
    format!("{}Api", module)
}

fn property_name(module: &str) -> String {
    let mut chars = module.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_module(out: &mut String, module: &ModuleBindings, api_prefix: &str) {
    out.push_str(&format!("export class {} {{\n", class_name(&module.name)));
    out.push_str("  constructor(private readonly http: HttpTransport) {}\n");

    for method in &module.methods {
        out.push('\n');
        render_method(out, method, api_prefix);
    }
    out.push_str("}\n");
}

fn render_method(out: &mut String, method: &MethodBinding, api_prefix: &str) {
    let mut params: Vec<String> = method
        .path_params
        .iter()
        .map(|(_, ident)| format!("{}: string | number", ident))
        .collect();

    if let Some(query) = &method.query {
        let ty = match query {
            QueryBinding::Fields(fields) => {
                let members: Vec<String> = fields
                    .iter()
                    .map(|f| {
                        let marker = if f.optional { "?" } else { "" };
                        format!("{}{}: {}", property_key(&f.name), marker, f.ty.client)
                    })
                    .collect();
                format!("{{ {} }}", members.join("; "))
            }
            QueryBinding::Opaque => "QueryInput".to_string(),
        };
        if query.all_optional() {
            params.push(format!("query: {} = {{}}", ty));
        } else {
            params.push(format!("query: {}", ty));
        }
    }

    if let Some(body) = &method.body {
        // always the last parameter
        let marker = if body.optional { "?" } else { "" };
        params.push(format!("body{}: {}", marker, body.ty.client));
    }

    let response = &method.response.ty.client;
    out.push_str(&format!("  /** {} {} ({}) */\n", method.method, method.path, method.handler));
    out.push_str(&format!(
        "  async {}({}): Promise<HttpResponse<{}>> {{\n",
        method.name,
        params.join(", "),
        response
    ));
    out.push_str(&format!("    return this.http.request<{}>({{\n", response));
    out.push_str(&format!("      method: {},\n", string_literal(method.method.as_str())));
    out.push_str(&format!("      url: {},\n", url_expression(method, api_prefix)));
    if method.query.is_some() {
        out.push_str("      query,\n");
    }
    if let Some(body) = &method.body {
        let key = match body.kind {
            BodyKind::Json => "json",
            BodyKind::Form => "form",
            BodyKind::FormData => "formData",
            BodyKind::Binary => "binary",
        };
        out.push_str(&format!("      {}: body,\n", key));
    }
    if method.auth {
        out.push_str("      auth: true,\n");
    }
    let response_type = match method.response.kind {
        ResponseKind::Json => "json",
        ResponseKind::Binary => "blob",
        ResponseKind::Text => "text",
        ResponseKind::Form => "formData",
    };
    out.push_str(&format!("      responseType: '{}',\n", response_type));
    out.push_str("    });\n");
    out.push_str("  }\n");
}

/// Template literal for the request URL with encoded path parameters.
fn url_expression(method: &MethodBinding, api_prefix: &str) -> String {
    let prefix = api_prefix.trim_end_matches('/');
    let mut url = String::from(prefix);

    for segment in method.path.split('/').filter(|s| !s.is_empty()) {
        url.push('/');
        let placeholder = segment.strip_prefix('{').and_then(|s| s.strip_suffix('}'));
        match placeholder.and_then(|p| {
            let p = p.trim_start_matches('*');
            method.path_params.iter().find(|(name, _)| name == p)
        }) {
            Some((_, ident)) => {
                url.push_str(&format!("${{encodeURIComponent(String({}))}}", ident));
            }
            None => url.push_str(&segment.replace('`', "\\`").replace("${", "\\${")),
        }
    }

    if url.is_empty() {
        url.push('/');
    }
    format!("`{}`", url)
}

fn render_root(out: &mut String, plan: &BindingPlan) {
    out.push_str("/** Entry point grouping every API module. */\n");
    out.push_str("export class ApiClient {\n");
    for module in &plan.modules {
        out.push_str(&format!(
            "  readonly {}: {};\n",
            property_name(&module.name),
            class_name(&module.name)
        ));
    }
    out.push('\n');
    out.push_str("  constructor(http: HttpTransport) {\n");
    for module in &plan.modules {
        out.push_str(&format!(
            "    this.{} = new {}(http);\n",
            property_name(&module.name),
            class_name(&module.name)
        ));
    }
    out.push_str("  }\n");
    out.push_str("}\n");
}
