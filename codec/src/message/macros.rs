//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

/// Defines a BSSCI message struct together with its wire encoding.
///
/// Every generated struct carries `op_id` plus the listed fields, derives
/// `Deserialize` (unknown keys ignored, optional keys may be missing or nil) and
/// serializes as a MessagePack map that starts with `command` and `opId`.
/// Optional fields are left out of the map entirely when they are `None`, and
/// the map length is counted up front so the encoding never needs buffering.
///
/// ```ignore
/// bssci_message! {
///     /// Uplink data
///     pub struct UlData = "ulData" {
///         ep_eui: Eui64 = "epEui",
///     }
///     optional {
///         eq_snr: f64 = "eqSnr",
///     }
/// }
/// ```
macro_rules! bssci_message {
    (
        $(#[$meta:meta])*
        $vis:vis struct $name:ident = $command:tt {
            $(
                $(#[$fmeta:meta])*
                $field:ident : $fty:ty = $key:tt
            ),* $(,)?
        }
        $(
            optional {
                $(
                    $(#[$ometa:meta])*
                    $ofield:ident : $oty:ty = $okey:tt
                ),* $(,)?
            }
        )?
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Default, serde::Deserialize)]
        $vis struct $name {
            /// Operation identifier
            #[serde(rename = "opId")]
            pub op_id: i64,
            $(
                $(#[$fmeta])*
                #[serde(rename = $key)]
                pub $field: $fty,
            )*
            $($(
                $(#[$ometa])*
                #[serde(rename = $okey, default)]
                pub $ofield: Option<$oty>,
            )*)?
        }

        impl $crate::message::Command for $name {
            const COMMAND: &'static str = $command;

            fn op_id(&self) -> i64 {
                self.op_id
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                use serde::ser::SerializeMap;

                let required: &[&str] = &[$($key),*];
                #[allow(unused_mut)]
                let mut len = 2 + required.len();
                $($(
                    if self.$ofield.is_some() {
                        len += 1;
                    }
                )*)?

                let mut map = serializer.serialize_map(Some(len))?;
                map.serialize_entry("command", $command)?;
                map.serialize_entry("opId", &self.op_id)?;
                $(
                    map.serialize_entry($key, &self.$field)?;
                )*
                $($(
                    if let Some(value) = &self.$ofield {
                        map.serialize_entry($okey, value)?;
                    }
                )*)?
                map.end()
            }
        }
    };
}

/// Marks message types the service center originates, so the connection can
/// stamp them with its own operation id before transmission.
macro_rules! server_issued {
    ($($name:ident),* $(,)?) => {
        $(
            impl $crate::message::ServerIssued for $name {
                fn set_op_id(&mut self, op_id: i64) {
                    self.op_id = op_id;
                }
            }
        )*
    };
}
