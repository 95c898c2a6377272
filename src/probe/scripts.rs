//! JavaScript wrappers evaluated in the page
//!
//! Probe bodies and battery operations are embedded as JSON string literals
//! and compiled in the page, so a body can never break its wrapper. Each
//! embedded value sits on its own `const` line. Wrappers end with a
//! `sourceURL` tag naming their role.

use crate::Result;

use super::traits::FaultOperation;

/// Stringifies a thrown value: strings verbatim, `message` of objects, `String()` otherwise
pub const FAULT_MESSAGE_FN: &str = "(e) => typeof e === 'string' ? e : (e !== null && typeof e === 'object' && 'message' in e ? String(e.message) : String(e))";

/// Deep-copies a value through JSON; `undefined` becomes `null`
pub const CLONE_FN: &str = "(v) => { const text = JSON.stringify(v); return text === undefined ? null : JSON.parse(text); }";

/// Prefix of every wrapper's `sourceURL` tag
pub const SOURCE_URL_PREFIX: &str = "//# sourceURL=fpcollect/";

const BATCH_TEMPLATE: &str = r#"(() => {
    const fault = __FAULT__;
    const clone = __CLONE__;
    const bodies = __PAYLOAD__;
    return bodies.map((body) => {
        try {
            return { ok: clone(new Function(body)()) };
        } catch (e) {
            return { fault: fault(e) };
        }
    });
})()
//# sourceURL=fpcollect/batch.js"#;

const ASYNC_TEMPLATE: &str = r#"(async () => {
    const fault = __FAULT__;
    const clone = __CLONE__;
    const AsyncFunction = Object.getPrototypeOf(async function () {}).constructor;
    const body = __PAYLOAD__;
    try {
        return { ok: clone(await new AsyncFunction(body)()) };
    } catch (e) {
        return { fault: fault(e) };
    }
})()
//# sourceURL=fpcollect/async.js"#;

const OBSERVE_TEMPLATE: &str = r#"(() => {
    const fault = __FAULT__;
    const key = __PAYLOAD__;
    if (window[key]) return false;
    const log = [];
    const onError = (event) => {
        log.push(event.error !== undefined && event.error !== null ? fault(event.error) : String(event.message));
    };
    const onRejection = (event) => {
        log.push(fault(event.reason));
    };
    window.addEventListener('error', onError);
    window.addEventListener('unhandledrejection', onRejection);
    Object.defineProperty(window, key, {
        configurable: true,
        value: {
            log,
            uninstall: () => {
                window.removeEventListener('error', onError);
                window.removeEventListener('unhandledrejection', onRejection);
            },
        },
    });
    return true;
})()
//# sourceURL=fpcollect/observe.js"#;

const BATTERY_TEMPLATE: &str = r#"(() => {
    const fault = __FAULT__;
    const operations = __PAYLOAD__;
    return operations.map((operation) => {
        try {
            new Function(operation.body)();
            return null;
        } catch (e) {
            return fault(e);
        }
    });
})()
//# sourceURL=fpcollect/battery.js"#;

const DRAIN_TEMPLATE: &str = r#"(() => {
    const key = __PAYLOAD__;
    const observer = window[key];
    if (!observer) return [];
    observer.uninstall();
    delete window[key];
    return observer.log.slice();
})()
//# sourceURL=fpcollect/drain.js"#;

/// Fill a template; the payload goes in last so its text is never rewritten
fn render(template: &str, payload: &str) -> String {
    template
        .replace("__FAULT__", FAULT_MESSAGE_FN)
        .replace("__CLONE__", CLONE_FN)
        .replace("__PAYLOAD__", payload)
}

/// Window property holding a run's fault observer
pub fn observer_key(run_id: &str) -> String {
    format!("__fpcollect_faults_{}", run_id)
}

/// Runs every body in one turn; yields `[{ok: value} | {fault: message}]`
pub fn batch_script(bodies: &[String]) -> Result<String> {
    Ok(render(BATCH_TEMPLATE, &serde_json::to_string(bodies)?))
}

/// Awaits one async body; yields `{ok: value} | {fault: message}`
pub fn async_script(body: &str) -> Result<String> {
    Ok(render(ASYNC_TEMPLATE, &serde_json::to_string(body)?))
}

/// Installs the run's global fault observer; yields `false` if already installed
pub fn observe_script(run_id: &str) -> Result<String> {
    Ok(render(OBSERVE_TEMPLATE, &serde_json::to_string(&observer_key(run_id))?))
}

/// Issues the battery; yields one inline slot (`null` or message) per operation
pub fn battery_script(operations: &[FaultOperation]) -> Result<String> {
    Ok(render(BATTERY_TEMPLATE, &serde_json::to_string(operations)?))
}

/// Uninstalls the run's observer; yields its log
pub fn drain_script(run_id: &str) -> Result<String> {
    Ok(render(DRAIN_TEMPLATE, &serde_json::to_string(&observer_key(run_id))?))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload_line<'a>(script: &'a str, name: &str) -> &'a str {
        let prefix = format!("const {} = ", name);
        script
            .lines()
            .map(str::trim)
            .find_map(|line| line.strip_prefix(prefix.as_str()))
            .and_then(|rest| rest.strip_suffix(';'))
            .unwrap()
    }

    #[test]
    fn test_batch_embeds_bodies_as_json() {
        let bodies = vec![
            "return 'a\"b';".to_string(),
            "throw new Error('x');\n// __PAYLOAD__ __FAULT__".to_string(),
        ];
        let script = batch_script(&bodies).unwrap();

        let embedded: Vec<String> = serde_json::from_str(payload_line(&script, "bodies")).unwrap();
        assert_eq!(embedded, bodies);
        assert!(script.ends_with("//# sourceURL=fpcollect/batch.js"));
        assert!(script.contains(FAULT_MESSAGE_FN));
    }

    #[test]
    fn test_async_embeds_body() {
        let script = async_script("return await Promise.resolve(42);").unwrap();
        let embedded: String = serde_json::from_str(payload_line(&script, "body")).unwrap();
        assert_eq!(embedded, "return await Promise.resolve(42);");
        assert!(script.starts_with("(async () => {"));
        assert!(script.contains("fpcollect/async.js"));
    }

    #[test]
    fn test_observer_scripts_share_key() {
        let observe = observe_script("run-1").unwrap();
        let drain = drain_script("run-1").unwrap();

        assert_eq!(payload_line(&observe, "key"), "\"__fpcollect_faults_run-1\"");
        assert_eq!(payload_line(&observe, "key"), payload_line(&drain, "key"));
        assert!(observe.contains("unhandledrejection"));
    }

    #[test]
    fn test_battery_embeds_operations() {
        let operations = vec![
            FaultOperation::inline("undefinedReference", "azeaze + 3;"),
            FaultOperation::out_of_band("timer", "setTimeout(() => {}, 0);"),
        ];
        let script = battery_script(&operations).unwrap();

        let embedded: serde_json::Value = serde_json::from_str(payload_line(&script, "operations")).unwrap();
        assert_eq!(embedded[0]["body"], "azeaze + 3;");
        assert_eq!(embedded[1]["delivery"], "outOfBand");
        assert!(script.contains("fpcollect/battery.js"));
    }
}
