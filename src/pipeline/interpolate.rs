//! Variable interpolation
//!
//! Substitutes `${NAME}` and `$NAME` references from the answer set into a
//! fixed set of fields. Unresolved references stay literal; there is no
//! escaping and `$$` is not special.

use crate::answers::AnswerSet;
use crate::descriptor::model::Descriptor;
use crate::error::Result;
use crate::pipeline::Processor;
use regex::Regex;

/// Interpolated fields: application name, image, net, entrypoint, volume
/// host and container paths, environment values, label values. Keys are
/// never interpolated.
pub struct Interpolate {
    pattern: Regex,
}

impl Interpolate {
    pub fn new() -> Self {
        Interpolate {
            pattern: Regex::new(r"\$\{([A-Za-z0-9_-]+)\}|\$([A-Za-z0-9_-]+)").unwrap(),
        }
    }

    /// Single left-to-right pass; substituted text is not rescanned.
    fn substitute(&self, text: &str, answers: &AnswerSet) -> String {
        self.pattern
            .replace_all(text, |caps: &regex::Captures| {
                let name = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                match answers.get(name) {
                    Some(value) => value.to_string(),
                    None => caps[0].to_string(),
                }
            })
            .to_string()
    }
}

impl Default for Interpolate {
    fn default() -> Self {
        Interpolate::new()
    }
}

impl Processor for Interpolate {
    fn name(&self) -> &'static str {
        "interpolate"
    }

    fn process(&self, descriptor: &mut Descriptor) -> Result<()> {
        let answers = descriptor.answers.clone();
        for app in &mut descriptor.applications {
            app.name = self.substitute(&app.name, &answers);
            app.image = self.substitute(&app.image, &answers);
            app.net = self.substitute(&app.net, &answers);
            app.entrypoint = self.substitute(&app.entrypoint, &answers);
            for volume in &mut app.volumes {
                volume.host = self.substitute(&volume.host, &answers);
                volume.container = self.substitute(&volume.container, &answers);
            }
            for entry in &mut app.environment {
                entry.value = self.substitute(&entry.value, &answers);
            }
            for entry in &mut app.labels {
                entry.value = self.substitute(&entry.value, &answers);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::model::KeyValue;

    fn answers(pairs: &[(&str, &str)]) -> AnswerSet {
        pairs.iter().map(|(k, v)| (*k, *v)).collect()
    }

    #[test]
    fn test_both_syntaxes() {
        let interpolate = Interpolate::new();
        let answers = answers(&[("region", "us")]);
        assert_eq!(interpolate.substitute("a-${region}-b", &answers), "a-us-b");
        assert_eq!(interpolate.substitute("a $region b", &answers), "a us b");
        assert_eq!(interpolate.substitute("img:$region", &answers), "img:us");
    }

    #[test]
    fn test_hyphen_is_a_name_character() {
        // in the bare form the name extends across hyphens, so an
        // unresolved composite stays literal
        let interpolate = Interpolate::new();
        let answers = answers(&[("region", "us")]);
        assert_eq!(interpolate.substitute("$region-b", &answers), "$region-b");
        assert_eq!(interpolate.substitute("${region}-b", &answers), "us-b");
    }

    #[test]
    fn test_unresolved_reference_stays_literal() {
        let interpolate = Interpolate::new();
        let answers = answers(&[]);
        assert_eq!(interpolate.substitute("${missing}", &answers), "${missing}");
        assert_eq!(interpolate.substitute("$missing", &answers), "$missing");
    }

    #[test]
    fn test_degenerate_dollar_forms_pass_through() {
        let interpolate = Interpolate::new();
        let answers = answers(&[("x", "1")]);
        assert_eq!(interpolate.substitute("${}", &answers), "${}");
        assert_eq!(interpolate.substitute("a $ b", &answers), "a $ b");
        assert_eq!(interpolate.substitute("$", &answers), "$");
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let interpolate = Interpolate::new();
        let answers = answers(&[("App_Name", "web")]);
        assert_eq!(interpolate.substitute("${APP_NAME}", &answers), "web");
        assert_eq!(interpolate.substitute("${appname}", &answers), "web");
    }

    #[test]
    fn test_scoped_fields_and_double_dollar() {
        let mut descriptor = Descriptor::from_yaml(
            r#"
applications:
  - name: "${app_name}"
    image: "img:$region"
    environment:
      region: "$region"
      LITERAL: "$$region"
"#,
        )
        .unwrap();
        descriptor.answers = answers(&[("app_name", "web"), ("region", "us")]);

        Interpolate::new().process(&mut descriptor).unwrap();

        let app = descriptor.application("web").unwrap();
        assert_eq!(app.name, "web");
        assert_eq!(app.image, "img:us");
        assert_eq!(app.environment[0], KeyValue::new("LITERAL", "$us"));
        assert_eq!(app.environment[1], KeyValue::new("region", "us"));
    }

    #[test]
    fn test_keys_and_out_of_scope_fields_untouched() {
        let mut descriptor = Descriptor::from_yaml(
            r#"
applications:
  - name: web
    image: img
    command: "echo $greeting"
    restart: "$greeting"
    links: ["$greeting"]
    environment:
      $greeting: "plain"
"#,
        )
        .unwrap();
        descriptor.answers = answers(&[("greeting", "hi")]);

        Interpolate::new().process(&mut descriptor).unwrap();

        let app = descriptor.application("web").unwrap();
        assert_eq!(app.command.as_ref().unwrap().to_string(), "echo $greeting");
        assert_eq!(app.restart, "$greeting");
        assert_eq!(app.links[0].from, "$greeting");
        assert_eq!(app.environment[0].key, "$greeting");
        assert_eq!(app.environment[0].value, "plain");
    }

    #[test]
    fn test_volume_paths_interpolated() {
        let mut descriptor = Descriptor::from_yaml(
            "applications:\n  - name: web\n    image: img\n    volumes: [\"${data_dir}:/var/${app}\"]\n",
        )
        .unwrap();
        descriptor.answers = answers(&[("data_dir", "/srv/data"), ("app", "web")]);

        Interpolate::new().process(&mut descriptor).unwrap();

        let volume = &descriptor.application("web").unwrap().volumes[0];
        assert_eq!(volume.host, "/srv/data");
        assert_eq!(volume.container, "/var/web");
    }
}
