//! Regenerated native project files.
//!
//! These are written whole on every patch run; only `app/build.gradle` is
//! edited in place (see [`super::overlay`]).

/// Bumped whenever a template below changes shape.
pub const TEMPLATE_VERSION: u32 = 3;

pub const ANDROID_PERMISSIONS: &[&str] = &[
    "android.permission.CAMERA",
    "android.permission.INTERNET",
    "android.permission.RECORD_AUDIO",
    "android.permission.MODIFY_AUDIO_SETTINGS",
    "android.permission.ACCESS_NETWORK_STATE",
    "android.permission.BLUETOOTH",
    "android.permission.BLUETOOTH_CONNECT",
];

// Permissions only requested up to a given SDK level.
const MAX_SDK: &[(&str, u32)] = &[("android.permission.BLUETOOTH", 30)];

const FEATURES: &[(&str, bool)] = &[
    ("android.hardware.camera", true),
    ("android.hardware.camera.autofocus", false),
    ("android.hardware.camera.ar", true),
];

/// Full `AndroidManifest.xml`. The package itself is declared by the
/// Gradle `namespace`, so the manifest carries no `package` attribute.
pub fn android_manifest() -> String {
    let mut out = String::from(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n\
         <manifest xmlns:android=\"http://schemas.android.com/apk/res/android\">\n\n",
    );
    for perm in ANDROID_PERMISSIONS {
        match MAX_SDK.iter().find(|(p, _)| p == perm) {
            Some((_, max)) => out.push_str(&format!(
                "    <uses-permission android:name=\"{}\" android:maxSdkVersion=\"{}\" />\n",
                perm, max
            )),
            None => out.push_str(&format!("    <uses-permission android:name=\"{}\" />\n", perm)),
        }
    }
    out.push('\n');
    for (feature, required) in FEATURES {
        out.push_str(&format!(
            "    <uses-feature android:name=\"{}\" android:required=\"{}\" />\n",
            feature, required
        ));
    }
    out.push_str("    <uses-feature android:glEsVersion=\"0x00020000\" android:required=\"true\" />\n\n");
    out.push_str(MANIFEST_APPLICATION);
    out
}

const MANIFEST_APPLICATION: &str = r#"    <application
        android:allowBackup="true"
        android:icon="@mipmap/ic_launcher"
        android:label="@string/app_name"
        android:roundIcon="@mipmap/ic_launcher_round"
        android:theme="@style/AppTheme"
        android:usesCleartextTraffic="true"
        android:networkSecurityConfig="@xml/network_security_config"
        android:hardwareAccelerated="true">

        <meta-data android:name="com.google.ar.core" android:value="required" />

        <activity
            android:name=".MainActivity"
            android:configChanges="orientation|keyboardHidden|keyboard|screenSize|locale|smallestScreenSize|screenLayout|uiMode"
            android:exported="true"
            android:launchMode="singleTask"
            android:theme="@style/AppTheme.NoActionBarLaunch">
            <intent-filter>
                <action android:name="android.intent.action.MAIN" />
                <category android:name="android.intent.category.LAUNCHER" />
            </intent-filter>
        </activity>

        <provider
            android:name="androidx.core.content.FileProvider"
            android:authorities="${applicationId}.fileprovider"
            android:exported="false"
            android:grantUriPermissions="true">
            <meta-data
                android:name="android.support.FILE_PROVIDER_PATHS"
                android:resource="@xml/file_paths" />
        </provider>
    </application>
</manifest>
"#;

fn xml_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "\\'")
}

pub fn strings_xml(app_name: &str, app_id: &str) -> String {
    let name = xml_escape(app_name);
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<resources>\n    \
         <string name=\"app_name\">{name}</string>\n    \
         <string name=\"title_activity_main\">{name}</string>\n    \
         <string name=\"package_name\">{app_id}</string>\n    \
         <string name=\"custom_url_scheme\">{app_id}</string>\n</resources>\n",
        name = name,
        app_id = app_id
    )
}

pub const FILE_PATHS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<paths xmlns:android="http://schemas.android.com/apk/res/android">
    <external-files-path name="my_images" path="Pictures" />
    <external-files-path name="my_movies" path="Movies" />
    <cache-path name="my_cache" path="." />
    <external-path name="external_files" path="." />
    <files-path name="files" path="." />
</paths>
"#;

const LOCAL_HOSTS: &[&str] = &["localhost", "10.0.2.2", "127.0.0.1"];

pub fn network_security_config(backend_host: Option<&str>) -> String {
    let mut domains = String::new();
    for host in LOCAL_HOSTS.iter().copied().chain(backend_host) {
        domains.push_str(&format!(
            "        <domain includeSubdomains=\"true\">{}</domain>\n",
            xml_escape(host)
        ));
    }
    format!(
        "<?xml version=\"1.0\" encoding=\"utf-8\"?>\n<network-security-config>\n    \
         <domain-config cleartextTrafficPermitted=\"true\">\n{}    </domain-config>\n    \
         <base-config cleartextTrafficPermitted=\"true\">\n        <trust-anchors>\n            \
         <certificates src=\"system\" />\n            <certificates src=\"user\" />\n        \
         </trust-anchors>\n    </base-config>\n</network-security-config>\n",
        domains
    )
}

pub const STYLES_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <style name="AppTheme" parent="Theme.AppCompat.Light.DarkActionBar">
        <item name="colorPrimary">@color/colorPrimary</item>
        <item name="colorPrimaryDark">@color/colorPrimaryDark</item>
        <item name="colorAccent">@color/colorAccent</item>
    </style>
    <style name="AppTheme.NoActionBar" parent="Theme.AppCompat.DayNight.NoActionBar">
        <item name="windowActionBar">false</item>
        <item name="windowNoTitle">true</item>
        <item name="android:background">@null</item>
    </style>
    <style name="AppTheme.NoActionBarLaunch" parent="AppTheme.NoActionBar">
        <item name="android:background">@drawable/splash_background</item>
    </style>
</resources>
"#;

pub const COLORS_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<resources>
    <color name="colorPrimary">#1565C0</color>
    <color name="colorPrimaryDark">#003C8F</color>
    <color name="colorAccent">#FF6F00</color>
    <color name="splashBackground">#FFFFFF</color>
</resources>
"#;

pub const SPLASH_BACKGROUND_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<layer-list xmlns:android="http://schemas.android.com/apk/res/android">
    <item android:drawable="@color/splashBackground" />
</layer-list>
"#;

pub fn main_activity(app_id: &str) -> String {
    format!(
        "package {};\n\nimport com.getcapacitor.BridgeActivity;\n\n\
         public class MainActivity extends BridgeActivity {{ }}\n",
        app_id
    )
}

pub const ROOT_BUILD_GRADLE: &str = r#"// Top-level build file.
buildscript {
    ext {
        androidxAppCompatVersion = '1.6.1'
        androidxCoreVersion = '1.12.0'
        androidxWebkitVersion = '1.10.0'
        junitVersion = '4.13.2'
        agpVersion = '8.2.1'
    }
    repositories {
        google()
        mavenCentral()
    }
    dependencies {
        classpath "com.android.tools.build:gradle:$agpVersion"
    }
}

allprojects {
    repositories {
        google()
        mavenCentral()
    }
}

task clean(type: Delete) {
    delete rootProject.buildDir
}
"#;

/// Module build file used when the template carries none.
/// `namespace` and `applicationId` are filled in by the overlay.
pub const APP_BUILD_GRADLE: &str = r#"apply plugin: 'com.android.application'

android {
    compileSdkVersion 34
    defaultConfig {
        minSdkVersion 24
        targetSdkVersion 34
        versionCode 1
        versionName "1.0"
        testInstrumentationRunner "androidx.test.runner.AndroidJUnitRunner"
    }
    buildTypes {
        release {
            minifyEnabled false
            proguardFiles getDefaultProguardFile('proguard-android-optimize.txt'), 'proguard-rules.pro'
        }
    }
    compileOptions {
        sourceCompatibility JavaVersion.VERSION_1_8
        targetCompatibility JavaVersion.VERSION_1_8
    }
    packagingOptions {
        exclude 'META-INF/DEPENDENCIES'
        exclude 'META-INF/LICENSE'
        exclude 'META-INF/NOTICE'
        exclude("META-INF/*.kotlin_module")
    }
}

repositories {
    google()
    mavenCentral()
}

dependencies {
    implementation fileTree(dir: 'libs', include: ['*.jar'])
    implementation 'androidx.appcompat:appcompat:1.6.1'
    implementation 'androidx.core:core:1.12.0'
    implementation 'androidx.webkit:webkit:1.10.0'
    implementation project(':capacitor-android')
    implementation project(':capacitor-camera')
    testImplementation 'junit:junit:4.13.2'
}
"#;

pub fn gradle_properties() -> String {
    format!(
        "# ar-packager template v{}\n\
         org.gradle.jvmargs=-Xmx2048m -Dfile.encoding=UTF-8\n\
         android.useAndroidX=true\n\
         android.enableJetifier=true\n\
         android.nonTransitiveRClass=false\n",
        TEMPLATE_VERSION
    )
}
