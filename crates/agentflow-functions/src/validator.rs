//! Call validation against registered schemas.

use agentflow_core::extension::FunctionOwner;
use agentflow_core::function::{Arguments, FunctionCall, FunctionError};
use tracing::debug;

/// Checks a requested call against its function's schema.
///
/// A successful validation leaves the parsed, default-filled arguments in
/// `call.parsed`.
#[derive(Debug, Clone, Copy)]
pub struct CallValidator {
    enabled: bool,
}

impl CallValidator {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Prepare a call for dispatch.
    ///
    /// With validation disabled only the argument payload is parsed.
    pub fn prepare(
        &self,
        call: &mut FunctionCall,
        owner: Option<&FunctionOwner>,
    ) -> Result<(), FunctionError> {
        if self.enabled {
            self.validate(call, owner)
        } else {
            call.parsed = Some(Arguments::parse(&call.name, &call.arguments)?);
            Ok(())
        }
    }

    /// Full validation, in order:
    /// 1. non-empty function name
    /// 2. a registered owner for the function
    /// 3. the payload parses to an object
    /// 4. every required parameter is present
    /// 5. supplied values match declared types and enums
    /// 6. declared defaults fill absent parameters
    /// 7. the owning extension's own argument check
    pub fn validate(
        &self,
        call: &mut FunctionCall,
        owner: Option<&FunctionOwner>,
    ) -> Result<(), FunctionError> {
        if call.name.trim().is_empty() {
            return Err(FunctionError::EmptyFunctionName);
        }

        let owner = owner.ok_or_else(|| FunctionError::NoExtensionForFunction {
            function: call.name.clone(),
        })?;
        let definition = &owner.definition;

        let mut args = Arguments::parse(&call.name, &call.arguments)?;

        if let Some(missing) = definition.required_parameters().find(|p| !args.has(&p.name)) {
            return Err(FunctionError::MissingRequiredParameter {
                function: call.name.clone(),
                parameter: missing.name.clone(),
            });
        }

        for parameter in &definition.parameters {
            let Some(value) = args.get(&parameter.name).filter(|v| !v.is_null()) else {
                continue;
            };
            if !parameter.param_type.accepts(value) {
                return Err(FunctionError::InvalidArgument {
                    function: call.name.clone(),
                    parameter: parameter.name.clone(),
                    reason: format!(
                        "expected {}, got {}",
                        parameter.param_type.as_str(),
                        value.type_name()
                    ),
                });
            }
            if !parameter.enum_values.is_empty() {
                let allowed = value
                    .as_str()
                    .is_some_and(|s| parameter.enum_values.iter().any(|v| v == s));
                if !allowed {
                    return Err(FunctionError::InvalidArgument {
                        function: call.name.clone(),
                        parameter: parameter.name.clone(),
                        reason: format!("must be one of [{}]", parameter.enum_values.join(", ")),
                    });
                }
            }
        }

        for parameter in &definition.parameters {
            if let Some(default) = &parameter.default_value {
                if !args.has(&parameter.name) {
                    args.insert(parameter.name.clone(), default.clone());
                }
            }
        }

        if !owner.provider.validate_arguments(&call.name, &args) {
            return Err(FunctionError::InvalidArgument {
                function: call.name.clone(),
                parameter: "*".to_string(),
                reason: format!("rejected by extension '{}'", owner.extension),
            });
        }

        debug!(function = %call.name, arguments = args.len(), "Call validated");
        call.parsed = Some(args);
        Ok(())
    }

    /// Boolean form of [`CallValidator::validate`].
    pub fn is_valid(&self, call: &mut FunctionCall, owner: Option<&FunctionOwner>) -> bool {
        self.validate(call, owner).is_ok()
    }
}

impl Default for CallValidator {
    fn default() -> Self {
        Self::new(true)
    }
}
